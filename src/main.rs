use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dlt645_rs::{
    init_logger, log_info, new_rtu_server, new_tcp_server, DataBits, Dlt645Error, Parity, StopBits,
};

#[derive(Parser)]
#[command(name = "dlt645-meter")]
#[command(about = "DL/T 645-2007 meter server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve meter reads over TCP
    Tcp {
        #[arg(long, default_value = "0.0.0.0:10521")]
        bind: String,
        #[arg(long, default_value = "5")]
        timeout_secs: u64,
    },
    /// Serve meter reads over a serial port
    Rtu {
        port: String,
        #[arg(long, default_value = "9600")]
        baudrate: u32,
        #[arg(long, default_value = "5")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Dlt645Error> {
    init_logger();

    let cli = Cli::parse();
    let server = match cli.command {
        Commands::Tcp { bind, timeout_secs } => {
            new_tcp_server(&bind, Duration::from_secs(timeout_secs))?
        }
        Commands::Rtu {
            port,
            baudrate,
            timeout_secs,
        } => new_rtu_server(
            &port,
            baudrate,
            DataBits::Eight,
            StopBits::One,
            Parity::None,
            Duration::from_secs(timeout_secs),
        )?,
    };

    server.set_address([0x00; 6]);
    server.set_energy(0x0000_0000, 123456.78)?;

    let server = Arc::new(server);
    let handle = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        log_info("shutdown signal received");
        handle.stop();
    });

    server.start().await
}
