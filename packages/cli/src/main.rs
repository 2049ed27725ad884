//! `hwire`: command-line access to a schema-described REST API.
//!
//! - **`describe`** prints a service, collection or method and what it contains.
//! - **`list`** fetches a collection, with filtering, paging and sorting.
//! - **`get`** fetches one member of a collection by id.
//! - **`invoke`** posts to a method, optionally as a tracked asynchronous job.
//!
//! Connection settings come from flags or the environment:
//!
//! ```sh
//! export HWIRE_URL=https://space.example.net
//! export HWIRE_USER=super HWIRE_PASSWORD=secret
//! export HWIRE_SCHEMA=./space.yaml
//!
//! hwire describe device_management
//! hwire list device_management devices --filter platform=MX480 --version 2
//! hwire invoke device_management discover_devices --param ip=10.0.0.9 --async
//! ```
//!
//! Exit status is 0 on success, 1 when an asynchronous job did not
//! complete, and 2 on any error.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use hyperwire::render::{render_description, render_node, render_progress};
use hyperwire::{
    Client, Describe, MethodCall, MonitorConfig, Posted, Query, RequestOptions, Service,
    TaskMonitor, TransportConfig,
};
use hyperwire_schema::SchemaDocument;
use tracing::{info, warn};

/// hwire: schema-driven REST client
#[derive(Parser)]
#[command(name = "hwire", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Connection {
    /// Server origin, e.g. https://space.example.net
    #[arg(long, env = "HWIRE_URL", global = true)]
    url: Option<String>,

    #[arg(long, env = "HWIRE_USER", global = true)]
    user: Option<String>,

    #[arg(long, env = "HWIRE_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// PEM file holding a client certificate and its private key.
    #[arg(long, env = "HWIRE_CERT", global = true, conflicts_with = "user")]
    cert: Option<PathBuf>,

    /// Schema document (YAML, or JSON by `.json` extension).
    #[arg(long, env = "HWIRE_SCHEMA", global = true)]
    schema: Option<PathBuf>,

    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    insecure: bool,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 60, global = true)]
    timeout: u64,

    /// Application that scopes the service name, if any.
    #[arg(long, global = true)]
    app: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Describe a service, or one of its collections or methods.
    ///
    /// PATH is `service`, `service.collection` or `service.method`.
    Describe { path: String },

    /// Fetch the members of a collection.
    List {
        service: String,
        collection: String,

        /// Field equality filter, repeatable: --filter name=value
        #[arg(long = "filter", value_name = "FIELD=VALUE", conflicts_with = "expr")]
        filters: Vec<String>,

        /// Raw filter expression, passed through unchanged.
        #[arg(long)]
        expr: Option<String>,

        #[arg(long)]
        start: Option<u64>,

        #[arg(long)]
        limit: Option<u64>,

        /// Sort field, repeatable.
        #[arg(long = "sort", value_name = "FIELD")]
        sort_by: Vec<String>,

        /// Domain id to scope the listing to.
        #[arg(long)]
        domain: Option<u64>,

        /// Accept header override.
        #[arg(long)]
        accept: Option<String>,

        /// Media type version.
        #[arg(long)]
        version: Option<u32>,

        /// Print the member trees as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Fetch one member of a collection by id.
    Get {
        service: String,
        collection: String,
        id: String,

        #[arg(long)]
        accept: Option<String>,

        #[arg(long)]
        version: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Invoke a method declared on a service.
    Invoke {
        service: String,
        method: String,

        /// Template parameter, repeatable: --param name=value
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// File whose contents are sent as the literal request body.
        #[arg(long, conflicts_with = "params")]
        body: Option<PathBuf>,

        #[arg(long)]
        content_type: Option<String>,

        #[arg(long)]
        accept: Option<String>,

        #[arg(long)]
        version: Option<u32>,

        /// Run as an asynchronous job and wait for it to finish.
        #[arg(long = "async")]
        run_async: bool,

        /// Schedule expression for the job (requires --async).
        #[arg(long, requires = "run_async")]
        schedule: Option<String>,

        /// Seconds each progress pull may block.
        #[arg(long, env = "HWIRE_WAIT_SECS")]
        wait_secs: Option<u64>,

        /// Consecutive empty pulls before giving up.
        #[arg(long, env = "HWIRE_MAX_EMPTY_PULLS")]
        max_empty_pulls: Option<u32>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hyperwire=info,hwire=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let client = connect(&cli.connection);
    let app = cli.connection.app.as_deref();

    match cli.command {
        Command::Describe { path } => {
            let mut parts = path.splitn(2, '.');
            let service = service(&client, app, parts.next().unwrap_or_default());
            let description = match parts.next() {
                None => service.description(),
                Some(child) => match service.lookup(child) {
                    Ok(hyperwire::Child::NestedCollection(c)) => c.description(),
                    Ok(hyperwire::Child::NestedMethod(m)) => m.description(),
                    Ok(other) => fatal(&format!("{path} is a {}, not a collection or method", other.kind())),
                    Err(e) => fatal(&e.to_string()),
                },
            };
            print!(
                "{}",
                render_description(&description.unwrap_or_else(|e| fatal(&e.to_string())))
            );
        }

        Command::List {
            service: service_name,
            collection,
            filters,
            expr,
            start,
            limit,
            sort_by,
            domain,
            accept,
            version,
            json,
        } => {
            let mut query = Query::new();
            for raw in &filters {
                let (field, value) = split_pair(raw, "--filter");
                query = query.filter_eq(field, value);
            }
            if let Some(expr) = expr {
                query = query.filter_expr(expr);
            }
            if let Some(start) = start {
                query = query.start(start);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            for field in sort_by {
                query = query.sort_by(field);
            }
            if let Some(domain) = domain {
                query = query.domain(domain);
            }
            if let Some(accept) = accept {
                query = query.accept(accept);
            }
            if let Some(version) = version {
                query = query.version(version);
            }

            let collection = service(&client, app, &service_name)
                .collection(&collection)
                .unwrap_or_else(|e| fatal(&e.to_string()));
            let members = collection
                .get(&query)
                .unwrap_or_else(|e| fatal(&e.to_string()));

            if json {
                let states: Vec<_> = members.iter().filter_map(|m| m.state()).collect();
                let out = serde_json::to_string_pretty(&states)
                    .unwrap_or_else(|e| fatal(&format!("failed to encode output: {e}")));
                println!("{out}");
            } else {
                for member in &members {
                    match member.state() {
                        Some(state) => print!("{}", render_node(state)),
                        None => println!("{} (no content)", member.id().unwrap_or_default()),
                    }
                }
                info!("hwire: {} members from {}", members.len(), collection.href());
            }
        }

        Command::Get {
            service: service_name,
            collection,
            id,
            accept,
            version,
            json,
        } => {
            let member = service(&client, app, &service_name)
                .collection(&collection)
                .and_then(|c| c.resource(&id))
                .and_then(|r| r.get(accept.as_deref(), version))
                .unwrap_or_else(|e| fatal(&e.to_string()));
            let Some(state) = member.state() else {
                fatal("server returned no content");
            };
            if json {
                let out = serde_json::to_string_pretty(state)
                    .unwrap_or_else(|e| fatal(&format!("failed to encode output: {e}")));
                println!("{out}");
            } else {
                print!("{}", render_node(state));
            }
        }

        Command::Invoke {
            service: service_name,
            method,
            params,
            body,
            content_type,
            accept,
            version,
            run_async,
            schedule,
            wait_secs,
            max_empty_pulls,
        } => {
            let method = service(&client, app, &service_name)
                .method(&method)
                .unwrap_or_else(|e| fatal(&e.to_string()));

            let mut call = MethodCall::new();
            for raw in &params {
                let (name, value) = split_pair(raw, "--param");
                call = call.param(name, value);
            }

            let mut options = RequestOptions::new();
            if let Some(path) = &body {
                let text = fs::read_to_string(path).unwrap_or_else(|e| {
                    fatal(&format!("failed to read {}: {e}", path.display()))
                });
                options = options.request_body(text);
            }
            if let Some(ct) = content_type {
                options = options.content_type(ct);
            }
            if let Some(a) = accept {
                options = options.accept(a);
            }
            if let Some(v) = version {
                options = options.version(v);
            }

            if !run_async {
                match method.post(call, &options) {
                    Ok(Posted::Returned(node)) => print!("{}", render_node(&node)),
                    Ok(_) => println!("ok"),
                    Err(e) => fatal(&e.to_string()),
                }
                return;
            }

            let mut config = MonitorConfig::from_env();
            if let Some(secs) = wait_secs {
                config = config.wait_interval(Duration::from_secs(secs));
            }
            if let Some(max) = max_empty_pulls {
                config = config.max_consecutive_empty(max);
            }

            let mut monitor =
                TaskMonitor::create(&client, config).unwrap_or_else(|e| fatal(&e.to_string()));
            let posted = {
                let mut options = options.task(&monitor);
                if let Some(s) = schedule {
                    options = options.schedule(s);
                }
                method.post(call, &options)
            };

            let outcome = match posted {
                Ok(Posted::Task(task)) => {
                    info!("hwire: job {} queued", task.id);
                    monitor.wait_for_task(&task.id)
                }
                Ok(_) => {
                    release(monitor);
                    println!("ok");
                    return;
                }
                Err(e) => {
                    release(monitor);
                    fatal(&e.to_string());
                }
            };
            release(monitor);

            match outcome {
                Ok(update) => {
                    print!("{}", render_progress(&update));
                    if let Some(data) = &update.data {
                        print!("{}", render_node(data));
                    }
                    if !update.is_complete() {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("hwire: {e}");
                    process::exit(1);
                }
            }
        }
    }
}

// --- helpers -----------------------------------------------------------------

fn connect(c: &Connection) -> Client {
    let url = c
        .url
        .as_deref()
        .unwrap_or_else(|| fatal("no server URL: pass --url or set HWIRE_URL"));
    let schema_path = c
        .schema
        .as_ref()
        .unwrap_or_else(|| fatal("no schema: pass --schema or set HWIRE_SCHEMA"));
    let schema = SchemaDocument::from_path(schema_path)
        .unwrap_or_else(|e| fatal(&format!("failed to load schema: {e}")));

    let mut config = TransportConfig::new(url)
        .timeout(Duration::from_secs(c.timeout))
        .accept_invalid_certs(c.insecure);
    if let Some(user) = &c.user {
        config = config.basic_auth(user.as_str(), c.password.clone().unwrap_or_default());
    }
    if let Some(cert) = &c.cert {
        let pem = fs::read(cert)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", cert.display())));
        config = config.certificate(pem);
    }

    Client::connect(schema, config).unwrap_or_else(|e| fatal(&e.to_string()))
}

fn service(client: &Client, app: Option<&str>, name: &str) -> Service {
    let found = match app {
        Some(app) => client.application(app).and_then(|a| a.service(name)),
        None => client.service(name),
    };
    found.unwrap_or_else(|e| fatal(&e.to_string()))
}

/// Delete the monitor's queue; failure is logged, not fatal.
fn release(monitor: TaskMonitor) {
    let queue = monitor.queue_name().to_string();
    if let Err(e) = monitor.delete() {
        warn!("hwire: could not delete queue {queue}: {e}");
    }
}

/// Split `name=value`, exiting with a usage message otherwise.
fn split_pair<'a>(raw: &'a str, flag: &str) -> (&'a str, &'a str) {
    raw.split_once('=')
        .unwrap_or_else(|| fatal(&format!("invalid {flag} {raw:?}: expected NAME=VALUE")))
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("hwire: {msg}");
    process::exit(2);
}
