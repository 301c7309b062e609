use anyhow::{Context, Result};
use background_services::button_reader::read_buttons;
use background_services::departure_fetcher::{WienerLinien, poll_departures};
use background_services::display_controller::{BoardEvent, UpdateSpeed, run_board};
use clap::Parser;
use config::Args;
use display::TerminalDisplay;
use dotenvy::dotenv;
use tokio::sync::{mpsc::channel, watch};
use tokio::{select, signal, spawn};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

mod background_services;
mod config;
mod display;
mod model;
mod utils;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    _ = dotenv();
    let args = Args::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let appender = tracing_appender::rolling::daily(&args.log_dir, "wiener_linien_board.log");
    let (non_blocking_appender, _guard) = tracing_appender::non_blocking(appender);

    // Stdout belongs to the display, so everything is logged to rolling files.
    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .pretty();

    Registry::default().with(file_log).with(env_filter).init();

    info!("Showing departures for RBL numbers {:?}", args.rbl);

    let wiener_linien = WienerLinien::new(&args.endpoint, args.api_key.clone(), args.timeout())
        .context("invalid API client configuration")?;

    let (board_sender, mut board_receiver) = channel::<BoardEvent>(32);
    let (speed_sender, speed_receiver) = watch::channel(UpdateSpeed::default());

    let mut poller = spawn(poll_departures(
        wiener_linien,
        args.rbl.clone(),
        speed_receiver,
        board_sender.clone(),
        args.refresh_periods(),
    ));

    // Not joined on shutdown, it's blocked on stdin
    std::thread::spawn(move || {
        if let Err(e) = read_buttons(std::io::stdin().lock(), board_sender) {
            error!("{e}");
        }
    });

    let display = TerminalDisplay::new(std::io::stdout(), args.columns, args.rows);
    let columns = args.columns;
    let mut board = spawn(async move {
        run_board(display, &mut board_receiver, speed_sender, columns).await
    });

    select! {
    res = signal::ctrl_c() => {
        match res {
            Ok(_) => info!("Shutting down"),
            Err(err) => error!("{:?}", err),
        }},
    res = &mut poller => {
        match res {
            Ok(Err(err)) => error!("{:?}", err.context("departure poller stopped")),
            Ok(Ok(_)) => info!("departure poller stopped"),
            Err(err) => error!("{:?}", err),
        }},
    res = &mut board => {
        match res {
            Ok(Err(err)) => error!("{:?}", err.context("display controller stopped")),
            Ok(Ok(_)) => info!("display controller stopped"),
            Err(err) => error!("{:?}", err),
        }},
    }

    poller.abort();
    board.abort();

    Ok(())
}
