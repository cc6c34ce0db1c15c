//! One-shot request against the JSON router.

use bugtrack_core::error::Result;

use crate::api::{Request, Response, Router};
use crate::cli::{ApiArgs, CommandContext, parse_pairs};
use crate::format::print_json;

/// Build the router request from command-line arguments.
///
/// # Errors
///
/// Returns `Json` for a body that is not JSON and `Validation` for a
/// malformed `--query` entry.
pub fn build_request(args: &ApiArgs) -> Result<Request> {
    let mut request = Request::new(&args.method, &args.path);
    for (key, value) in parse_pairs("query", &args.query)? {
        request = request.with_query(&key, &value);
    }
    if let Some(body) = args.body.as_deref() {
        request = request.with_body(serde_json::from_str(body)?);
    }
    Ok(request)
}

/// Execute the api command.
///
/// Prints `{"status": .., "body": ..}` and returns the response so the
/// caller can derive the exit status.
///
/// # Errors
///
/// Returns an error only when the request cannot be built or the workspace
/// cannot be opened; routing failures are part of the response.
pub fn execute(args: &ApiArgs, ctx: &CommandContext) -> Result<Response> {
    let request = build_request(args)?;
    let mut session = ctx.open()?;
    let response = {
        let mut router = Router::new(
            &mut session.storage,
            &session.registry,
            &session.workspace.config,
            session.actor.clone(),
        );
        router.handle(&request)
    };
    tracing::debug!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        "Handled request"
    );

    print_json(&serde_json::json!({
        "status": response.status,
        "body": response.body,
    }))?;
    Ok(response)
}
