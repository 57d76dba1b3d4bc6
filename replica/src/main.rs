use std::process::exit;

use replica::config::ReplicaConfig;
use replica::engine::Engine;
use replica::error::ReplicaError;
use replica::transport::TcpTransport;

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        log::error!("{}", err);
        exit(1);
    }
}

fn run() -> Result<(), ReplicaError> {
    let config = ReplicaConfig::from_args(std::env::args())?;
    let addr = config.own_endpoint()?;
    log::info!("{} connecting to the network substrate at {}", config.node_id, addr);

    let transport = TcpTransport::connect(addr)?;
    let mut rng = rand::thread_rng();
    let mut engine = Engine::new(config, transport, &mut rng);
    engine.run()
}
