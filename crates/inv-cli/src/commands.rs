use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use inv_jsonrpc::{ErrorCode, JsonRpcError, Outcome, RequestId, Response, SingleRequest, SingleResponse};
use inv_rpc::{ClientRequest, ClientSession, RpcError};
use inv_server::{ClientConfig, HttpClientSession, InvServer, ServerConfig};
use serde_json::{json, Value};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Call(args) => cmd_call(args, format),
        Command::Types(args) => cmd_types(args, format),
        Command::Methods(args) => cmd_methods(args, format),
    }
}

fn serve_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(path) = &args.data_file {
        config.data_file = Some(path.clone());
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.enforce_acl {
        config.enforce_acl = true;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = serve_config(&args)?;
    println!(
        "{} Serving on {}{}",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.rpc_path
    );
    if let Some(path) = &config.data_file {
        println!("  Store: {}", path.display().to_string().cyan());
    }
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move { InvServer::new(config)?.serve().await })?;
    println!("{} Server stopped.", "✓".green());
    Ok(())
}

fn connect(remote: &RemoteArgs) -> anyhow::Result<Arc<dyn ClientSession>> {
    tracing::debug!(url = %remote.url, "opening http session");
    let config = ClientConfig {
        url: remote.url.clone(),
        ..ClientConfig::default()
    };
    Ok(Arc::new(HttpClientSession::new(&config)?))
}

/// Result of one call; error responses are reported, not returned.
fn request(session: &Arc<dyn ClientSession>, call: SingleRequest) -> anyhow::Result<SingleResponse> {
    let id = call.id.clone();
    match ClientRequest::new(session, call).complete() {
        Ok(Response::Single(single)) => Ok(single),
        Ok(Response::Batch(_)) => bail!("server answered a single call with a batch"),
        Err(RpcError::Protocol(JsonRpcError::Remote { code, message })) => {
            Ok(SingleResponse::failure(id, ErrorCode::from_code(code), message))
        }
        Err(err) => Err(err.into()),
    }
}

fn cmd_call(args: CallArgs, format: OutputFormat) -> anyhow::Result<()> {
    let params: Value = match &args.params {
        Some(text) => serde_json::from_str(text).context("--params is not valid JSON")?,
        None => json!({}),
    };
    let session = connect(&args.remote)?;
    if args.notify {
        session.notify(&SingleRequest::notification(args.method.clone(), params).into())?;
        println!("{} Notification {} sent.", "✓".green(), args.method.yellow());
        return Ok(());
    }
    let call = SingleRequest::new(RequestId::Number(args.id), args.method, params);
    let response = request(&session, call)?;
    print_response(&response, format)
}

fn cmd_types(args: RemoteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let session = connect(&args)?;
    let response = request(&session, SingleRequest::new(RequestId::Number(1), "datamodel.types", json!({})))?;
    if format == OutputFormat::Json || response.is_error() {
        return print_response(&response, format);
    }
    if let Outcome::Result(Value::Array(types)) = &response.outcome {
        for name in types.iter().filter_map(Value::as_str) {
            println!("  {}", name.cyan());
        }
    }
    Ok(())
}

fn cmd_methods(args: MethodsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let session = connect(&args.remote)?;
    let call = SingleRequest::new(
        RequestId::Number(1),
        "datamodel.methods",
        json!({ "type": args.type_name }),
    );
    let response = request(&session, call)?;
    if format == OutputFormat::Json || response.is_error() {
        return print_response(&response, format);
    }
    if let Outcome::Result(Value::Array(methods)) = &response.outcome {
        println!("{}", args.type_name.bold());
        for method in methods {
            println!("{}", method_line(method));
        }
    }
    Ok(())
}

fn method_line(method: &Value) -> String {
    let name = method["name"].as_str().unwrap_or("?");
    let right = method["right"].as_str().unwrap_or("?");
    let scope = if method["needs_object"].as_bool().unwrap_or(true) {
        ""
    } else {
        " (type-wide)"
    };
    format!("  {:<24} {}{}", name, right.dimmed(), scope)
}

fn print_response(response: &SingleResponse, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&response.to_value())?);
        if response.is_error() {
            bail!("call failed");
        }
        return Ok(());
    }
    match &response.outcome {
        Outcome::Result(value) => {
            println!("{}", render(value));
            Ok(())
        }
        Outcome::Error(err) => {
            println!("{} {} {}", "✗".red().bold(), format!("[{}]", err.ec).red(), err.message);
            bail!("call failed")
        }
    }
}

/// Strings print bare; everything else as indented JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
