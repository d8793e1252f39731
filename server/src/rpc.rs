//! Remote procedure calls over HTTP.
//!
//! A call arrives as `/rpc/<command>(name=<json>, ...)` on the command's
//! declared method, as `/rpc/<command>()`, or as a bare `POST /rpc/<command>`
//! whose body carries the arguments. Every answer is a JSON object with a
//! `status` of `"success"` or `"error"` and a `data` payload.

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use runtime::{Permission, Runtime, RuntimeError};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, error};

/// Keyword arguments of a call.
pub type Args = Map<String, Value>;

/// Signature shared by every command implementation.
pub type Handler = fn(&mut Context<'_>, Args) -> Result<Outcome, RpcError>;

/// A command the server answers to.
pub struct Command {
    pub name: &'static str,
    pub method: Method,
    pub permission: Option<Permission>,
    /// Skip the permission check while no user account exists yet.
    pub open_without_users: bool,
    pub handler: Handler,
}

impl Command {
    pub fn get(name: &'static str, handler: Handler) -> Self {
        Self {
            name,
            method: Method::GET,
            permission: None,
            open_without_users: false,
            handler,
        }
    }

    pub fn post(name: &'static str, handler: Handler) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(name, handler)
        }
    }

    pub fn requires(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn open_without_users(mut self) -> Self {
        self.open_without_users = true;
        self
    }

    fn permitted(&self, permissions: &BTreeSet<Permission>, runtime: &Runtime) -> bool {
        match self.permission {
            None => true,
            Some(_) if self.open_without_users && runtime.users().is_empty() => true,
            Some(p) => permissions.contains(&p),
        }
    }
}

/// What a command sees of the request and the server.
pub struct Context<'a> {
    pub runtime: &'a mut Runtime,
    pub user_id: Option<String>,
    pub token: Option<String>,
}

impl Context<'_> {
    /// Owner recorded for things this request creates.
    pub fn owner(&self) -> String {
        self.user_id.clone().unwrap_or_else(|| "guest".to_string())
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub success: bool,
    pub data: Value,
    pub set_cookie: Option<String>,
}

impl Outcome {
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: data.into(),
            set_cookie: None,
        }
    }

    pub fn error(data: impl Into<Value>) -> Self {
        Self {
            success: false,
            ..Self::success(data)
        }
    }

    pub fn with_cookie(mut self, cookie: String) -> Self {
        self.set_cookie = Some(cookie);
        self
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Malformed arguments for remote procedure call: {0}")]
    Malformed(String),
    #[error("Bad parameters in remote procedure call: {0}")]
    BadParameters(String),
    #[error("Insufficient permissions for remote procedure call")]
    InsufficientPermissions,
    #[error("Unknown remote procedure call: {0}")]
    UnknownCommand(String),
    #[error("Method {method} not allowed for remote procedure call {command}")]
    MethodNotAllowed { command: String, method: Method },
    #[error("{0}")]
    Failed(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Malformed(_) | RpcError::BadParameters(_) => StatusCode::BAD_REQUEST,
            RpcError::InsufficientPermissions => StatusCode::UNAUTHORIZED,
            RpcError::UnknownCommand(_) => StatusCode::NOT_FOUND,
            RpcError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RpcError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RuntimeError> for RpcError {
    fn from(err: RuntimeError) -> Self {
        RpcError::Failed(err.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = json!({"status": "error", "data": self.to_string()});
        (self.status(), Json(body)).into_response()
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let status = if self.success { "success" } else { "error" };
        let mut response = Json(json!({"status": status, "data": self.data})).into_response();
        if let Some(cookie) = self.set_cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
        response
    }
}

/// Decode keyword arguments into a command's parameter struct.
pub fn params<T: DeserializeOwned>(args: Args) -> Result<T, RpcError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| RpcError::BadParameters(e.to_string()))
}

/// How the arguments of a call were written.
#[derive(Debug, PartialEq)]
enum CallForm<'a> {
    /// `command`: arguments travel in the request body.
    Bare,
    /// `command(...)`: arguments travel in the path.
    Inline(&'a str),
}

fn split_call(call: &str) -> (&str, CallForm<'_>) {
    match call.find('(') {
        Some(open) if call.ends_with(')') => {
            (&call[..open], CallForm::Inline(&call[open + 1..call.len() - 1]))
        }
        _ => (call, CallForm::Bare),
    }
}

/// Parse `a=<json>, b=<json>` into keyword arguments.
///
/// Pieces without `=` belong to the previous piece, so commas inside JSON
/// lists and objects survive the split.
pub fn parse_arguments(argument: &str) -> Result<Args, RpcError> {
    let mut args = Args::new();
    if argument.trim().is_empty() {
        return Ok(args);
    }
    let mut pieces: Vec<String> = Vec::new();
    for piece in argument.split(',') {
        if piece.contains('=') {
            pieces.push(piece.to_string());
        } else {
            let last = pieces.last_mut().ok_or_else(|| {
                RpcError::Malformed(format!("argument {piece:?} has no name"))
            })?;
            last.push(',');
            last.push_str(piece);
        }
    }
    for piece in pieces {
        let mut parts = piece.split('=');
        let (name, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) => (name.trim(), value),
            _ => {
                return Err(RpcError::Malformed(format!(
                    "too many '=' in argument {piece:?}"
                )))
            }
        };
        let value: Value = serde_json::from_str(value.trim())
            .map_err(|e| RpcError::Malformed(format!("{name}: {e}")))?;
        args.insert(name.to_string(), value);
    }
    Ok(args)
}

/// Read keyword arguments from a POST body: a JSON object, or form fields
/// whose values are JSON.
pub fn parse_body(body: &[u8]) -> Result<Args, RpcError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Args::new());
    }
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return match value {
            Value::Object(args) => Ok(args),
            Value::Null => Ok(Args::new()),
            other => Err(RpcError::Malformed(format!(
                "expected a JSON object, got {other}"
            ))),
        };
    }
    let mut args = Args::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let name = key.trim_matches(|c| c == '[' || c == ']');
        let value: Value = serde_json::from_str(&value)
            .map_err(|e| RpcError::Malformed(format!("{name}: {e}")))?;
        args.insert(name.to_string(), value);
    }
    Ok(args)
}

/// Session token from the `token` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix("token="))
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolve `call` against `commands` and run it.
pub fn dispatch(
    commands: &[Command],
    runtime: &mut Runtime,
    method: &Method,
    call: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Outcome, RpcError> {
    let (name, form) = split_call(call);
    let command = commands
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| RpcError::UnknownCommand(name.to_string()))?;
    let allowed = match form {
        CallForm::Bare => Method::POST,
        CallForm::Inline(_) => command.method.clone(),
    };
    if *method != allowed {
        return Err(RpcError::MethodNotAllowed {
            command: name.to_string(),
            method: method.clone(),
        });
    }
    let args = match form {
        CallForm::Bare => parse_body(body)?,
        CallForm::Inline(argument) => parse_arguments(argument)?,
    };

    let token = session_token(headers);
    let permissions = runtime
        .users()
        .get_permissions_for_session_token(token.as_deref());
    if !command.permitted(&permissions, runtime) {
        return Err(RpcError::InsufficientPermissions);
    }
    let user_id = runtime
        .users()
        .get_user_id_for_session_token(token.as_deref());
    debug!(command = name, user = ?user_id, "remote procedure call");

    let mut ctx = Context {
        runtime,
        user_id,
        token,
    };
    (command.handler)(&mut ctx, args).map_err(|err| {
        if let RpcError::Failed(message) = &err {
            error!(command = name, %message, "remote procedure call failed");
        }
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_call_forms() {
        assert_eq!(split_call("get_version"), ("get_version", CallForm::Bare));
        assert_eq!(split_call("get_version()"), ("get_version", CallForm::Inline("")));
        assert_eq!(
            split_call("step_world(world_uid=\"w\")"),
            ("step_world", CallForm::Inline("world_uid=\"w\""))
        );
    }

    #[test]
    fn lists_survive_comma_split() {
        let args = parse_arguments(r#"values=[1, 2.5, 3], name= "x""#).unwrap();
        assert_eq!(args["values"], json!([1, 2.5, 3]));
        assert_eq!(args["name"], json!("x"));
    }

    #[test]
    fn objects_survive_comma_split() {
        let args = parse_arguments(r#"kind={"type":"sensor","datasource":"a"}"#).unwrap();
        assert_eq!(args["kind"], json!({"type": "sensor", "datasource": "a"}));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(matches!(parse_arguments("1, a=2"), Err(RpcError::Malformed(_))));
        assert!(matches!(parse_arguments("a=b=1"), Err(RpcError::Malformed(_))));
        assert!(matches!(parse_arguments("a=nojson"), Err(RpcError::Malformed(_))));
    }

    #[test]
    fn body_accepts_json_and_form_fields() {
        let args = parse_body(br#"{"world_uid": "w"}"#).unwrap();
        assert_eq!(args["world_uid"], json!("w"));

        let args = parse_body(b"values%5B%5D=%5B1%2C2%5D&name=%22x%22").unwrap();
        assert_eq!(args["values"], json!([1, 2]));
        assert_eq!(args["name"], json!("x"));

        assert!(parse_body(b"").unwrap().is_empty());
        assert!(matches!(parse_body(b"[1, 2]"), Err(RpcError::Malformed(_))));
    }

    #[test]
    fn token_is_read_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=abc123"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(RpcError::Malformed(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(RpcError::InsufficientPermissions.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RpcError::Failed("boom".into()).to_string(),
            "boom"
        );
    }
}
