#[macro_use]
extern crate tracing;

mod config;
mod ipc;
mod macros;
mod services;
mod singletons;
mod utils;
mod widgets;

use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use crate::config::FeedFormat;
use crate::ipc::{IpcRequest, IpcResponse};
use crate::services::notifications::client::NotificationBuilder;
use crate::singletons::notifications::{NotificationPopups, Urgency};
use crate::widgets::notifications::view::{PopupState, SystemLookup};

/// Notification popups for hlybar
#[derive(Parser)]
#[command(name = "hlybar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notification daemon and stream popups to stdout (default)
    Run,
    /// Send a notification over D-Bus
    Notify {
        #[arg(long)]
        summary: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        app_name: Option<String>,
        #[arg(long)]
        app_icon: Option<String>,
        /// low, normal or critical
        #[arg(long)]
        urgency: Option<Urgency>,
        /// Id of the notification to replace
        #[arg(long)]
        replaces: Option<u32>,
        /// Image file path or icon name
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        desktop_entry: Option<String>,
        #[arg(long)]
        expire_timeout: Option<i32>,
        /// Action as key:label, may be repeated
        #[arg(long = "action", value_parser = parse_action)]
        actions: Vec<(String, String)>,
    },
    /// Dismiss a notification in the running instance
    Dismiss { id: u32 },
    /// Invoke an action of a notification in the running instance
    Invoke { id: u32, action: String },
    /// Print the popups currently shown by the running instance
    List,
}

fn parse_action(value: &str) -> Result<(String, String), String> {
    match value.split_once(':') {
        Some((key, label)) if !key.is_empty() => Ok((key.to_owned(), label.to_owned())),
        _ => Err(format!("expected key:label, got {:?}", value)),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn handle_ipc_request(popups: Option<&NotificationPopups>, request: IpcRequest) -> IpcResponse {
    let Some(popups) = popups else {
        return IpcResponse::error("notification popups are unavailable");
    };

    let result = match request {
        IpcRequest::Dismiss { id } => popups.dismiss(id),
        IpcRequest::Invoke { id, action } => popups.invoke_action(id, &action),
        IpcRequest::List => {
            let store = popups.store();
            let time_format = config::read_config().notifications.time_format;
            let state = PopupState::build(&store.notifications(), store.visible(), &time_format, &SystemLookup);
            return IpcResponse::popups(&state);
        },
    };

    match result {
        Ok(()) => IpcResponse::ok(),
        Err(err) => IpcResponse::error(err.to_string()),
    }
}

async fn run() -> ExitCode {
    let settings = config::read_config();
    config::watch();

    let popups = singletons::notifications::activate(&settings.notifications).await.map(Rc::new);

    if let Some(popups) = &popups {
        let store = popups.store();

        if settings.notifications.feed == FeedFormat::Json {
            widgets::notifications::attach_feed(
                store,
                std::io::stdout(),
                SystemLookup,
                || config::read_config().notifications.time_format,
            );
        }

        widgets::notifications::watch_visibility(store, Duration::from_secs(1));
        singletons::notifications::follow_config(store, Duration::from_secs(1));
    }

    let ipc_result = ipc::server::start({
        let popups = popups.clone();
        move |request| handle_ipc_request(popups.as_deref(), request)
    });

    if let Err(err) = ipc_result {
        error!(%err, "Failed to start IPC server");
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");

    if let Some(popups) = &popups {
        debug!(popups = popups.store().len(), "Tearing down notification popups");
        popups.teardown();
    }

    ipc::server::drop_socket();
    ExitCode::SUCCESS
}

fn print_response(response: Result<IpcResponse, ipc::IpcError>) -> ExitCode {
    match response {
        Ok(IpcResponse { ok: true, popups: Some(popups), .. }) => {
            println!("{}", popups);
            ExitCode::SUCCESS
        },

        Ok(IpcResponse { ok: true, .. }) => ExitCode::SUCCESS,

        Ok(IpcResponse { message, .. }) => {
            eprintln!("{}", message.unwrap_or_else(|| "request failed".to_owned()));
            ExitCode::FAILURE
        },

        Err(err) => {
            eprintln!("Failed to reach hlybar: {}", err);
            ExitCode::FAILURE
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => tokio::task::LocalSet::new().run_until(run()).await,

        Commands::Notify {
            summary,
            body,
            app_name,
            app_icon,
            urgency,
            replaces,
            image,
            desktop_entry,
            expire_timeout,
            actions,
        } => {
            let mut builder = NotificationBuilder::new().summary(&summary);

            if let Some(body) = body { builder = builder.body(&body); }
            if let Some(app_name) = app_name { builder = builder.app_name(&app_name); }
            if let Some(app_icon) = app_icon { builder = builder.app_icon(&app_icon); }
            if let Some(urgency) = urgency { builder = builder.urgency(urgency.as_byte()); }
            if let Some(replaces) = replaces { builder = builder.replaces_id(replaces); }
            if let Some(image) = image { builder = builder.image_path(&image); }
            if let Some(entry) = desktop_entry { builder = builder.desktop_entry(&entry); }
            if let Some(timeout) = expire_timeout { builder = builder.expire_timeout(timeout); }

            for (key, label) in &actions {
                builder = builder.action(key, label);
            }

            match builder.send() {
                Ok(id) => {
                    println!("{}", id);
                    ExitCode::SUCCESS
                },

                Err(err) => {
                    eprintln!("Failed to send notification: {}", err);
                    ExitCode::FAILURE
                },
            }
        },

        Commands::Dismiss { id } => print_response(ipc::client::send_request(&IpcRequest::Dismiss { id })),
        Commands::Invoke { id, action } => print_response(ipc::client::send_request(&IpcRequest::Invoke { id, action })),
        Commands::List => print_response(ipc::client::send_request(&IpcRequest::List)),
    }
}
