use calabo_core::prelude::*;
use std::env;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1).map(String::as_str) {
        Some("--config") => match args.get(2) {
            Some(path) => match ControllerConfig::load(std::path::Path::new(path)) {
                Ok(config) => config,
                Err(e) => {
                    println!("Failed to load {}: {}", path, e);
                    return;
                }
            },
            None => {
                println!("Usage: settings_dump [--config <file> | <port>]");
                return;
            }
        },
        Some(port) => ControllerConfig::for_port(port),
        None => ControllerConfig::default(),
    };

    let result = if config.port_name.is_empty() {
        println!("No port given, using demo device");
        run(DemoGrbl::new(), config)
    } else {
        println!("Connecting to {} at {} baud", config.port_name, config.baud_rate);
        let port = SerialTransport::new(config.port_name.clone(), Some(config.baud_rate));
        run(port, config)
    };

    if let Err(e) = result {
        println!("Error: {}", e);
    }
}

fn run<T: Transport>(transport: T, config: ControllerConfig) -> Result<()> {
    let session = Session::open(transport, config)?;

    session.with_controller(|c| {
        println!(
            "Grbl {} state {:?} lock {:?}",
            c.firmware_version().unwrap_or("?"),
            c.run_state(),
            c.lock_state()
        );
    });

    for (name, value) in session.get_all_settings(true, false)? {
        println!("  {:40} {}", name, value);
    }
    Ok(())
}
