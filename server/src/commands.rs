//! The commands served under `/rpc/`.

use crate::rpc::{params, Args, Command, Context, Outcome, RpcError};
use nodenet::NodeKind;
use runtime::{Permission, Role, UserError};
use serde::Deserialize;
use serde_json::{json, to_value, Value};
use tracing::info;
use world::Config;

/// Every command known to the server.
pub fn all() -> Vec<Command> {
    use Permission::*;
    vec![
        Command::get("generate_uid", generate_uid),
        Command::get("get_version", get_version),
        Command::post("login", login),
        Command::get("logout", logout),
        Command::post("create_user", create_user)
            .requires(ManageUsers)
            .open_without_users(),
        Command::get("get_logger_messages", get_logger_messages),
        Command::get("get_available_worlds", get_available_worlds),
        Command::get("get_world_properties", get_world_properties),
        Command::get("new_world", new_world).requires(ManageWorlds),
        Command::get("delete_world", delete_world).requires(ManageWorlds),
        Command::get("step_world", step_world).requires(ManageWorlds),
        Command::get("get_available_worldadapters", get_available_worldadapters),
        Command::get("spawn_agent", spawn_agent).requires(ManageWorlds),
        Command::get("get_worldadapter_values", get_worldadapter_values),
        Command::get("set_datatarget_values", set_datatarget_values).requires(ManageNodenets),
        Command::get("get_available_nodenets", get_available_nodenets),
        Command::get("get_nodenet", get_nodenet),
        Command::get("new_nodenet", new_nodenet).requires(ManageNodenets),
        Command::get("delete_nodenet", delete_nodenet).requires(ManageNodenets),
        Command::get("add_node", add_node).requires(ManageNodenets),
        Command::get("add_link", add_link).requires(ManageNodenets),
        Command::get("set_node_activation", set_node_activation).requires(ManageNodenets),
        Command::get("step_nodenet", step_nodenet).requires(ManageNodenets),
        Command::get("start_nodenetrunner", start_nodenetrunner).requires(ManageNodenets),
        Command::get("stop_nodenetrunner", stop_nodenetrunner).requires(ManageNodenets),
    ]
}

fn encode(value: impl serde::Serialize) -> Result<Value, RpcError> {
    to_value(value).map_err(|e| RpcError::Failed(e.to_string()))
}

fn no_params(args: Args) -> Result<(), RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Nothing {}
    params::<Nothing>(args).map(|_| ())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WorldRef {
    world_uid: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentRef {
    world_uid: String,
    agent_uid: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NodenetRef {
    nodenet_uid: String,
}

fn generate_uid(_: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    no_params(args)?;
    Ok(Outcome::success(shared::generate_uid()))
}

fn get_version(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    no_params(args)?;
    let config = ctx.runtime.config();
    Ok(Outcome::success(json!({
        "apptitle": config.apptitle,
        "version": config.version,
    })))
}

fn login(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        user_id: String,
        password: String,
    }
    let p: Params = params(args)?;
    match ctx.runtime.users_mut().start_session(&p.user_id, &p.password) {
        Ok(token) => {
            let cookie = format!("token={token}; Path=/");
            Ok(Outcome::success(json!({ "token": token })).with_cookie(cookie))
        }
        Err(err) => Ok(Outcome::error(err.to_string())),
    }
}

fn logout(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    no_params(args)?;
    let ended = match ctx.token.as_deref() {
        Some(token) => ctx.runtime.users_mut().end_session(token),
        None => false,
    };
    Ok(Outcome::success(ended).with_cookie("token=; Path=/; Max-Age=0".to_string()))
}

fn create_user(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        user_id: String,
        password: String,
        #[serde(default = "default_role")]
        role: Role,
    }
    fn default_role() -> Role {
        Role::Restricted
    }
    let p: Params = params(args)?;
    match ctx.runtime.users_mut().create_user(&p.user_id, &p.password, p.role) {
        Ok(user_id) => Ok(Outcome::success(user_id)),
        Err(err @ UserError::InvalidId(_)) => Ok(Outcome::error(err.to_string())),
        Err(err) => Err(RpcError::Failed(err.to_string())),
    }
}

fn get_logger_messages(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        #[serde(default)]
        after: Option<u64>,
    }
    let p: Params = params(args)?;
    let logs = ctx.runtime.logs().messages_after(p.after);
    Ok(Outcome::success(encode(logs)?))
}

fn get_available_worlds(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    no_params(args)?;
    Ok(Outcome::success(encode(ctx.runtime.get_available_worlds())?))
}

fn get_world_properties(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: WorldRef = params(args)?;
    Ok(Outcome::success(encode(ctx.runtime.get_world_properties(&p.world_uid)?)?))
}

fn new_world(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        world_name: String,
        #[serde(default = "default_world_type")]
        world_type: String,
        #[serde(default)]
        config: Config,
    }
    fn default_world_type() -> String {
        "DefaultWorld".to_string()
    }
    let p: Params = params(args)?;
    let owner = ctx.owner();
    let uid = ctx
        .runtime
        .new_world(&p.world_name, &p.world_type, &owner, p.config)?;
    Ok(Outcome::success(uid))
}

fn delete_world(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: WorldRef = params(args)?;
    ctx.runtime.delete_world(&p.world_uid)?;
    Ok(Outcome::success(Value::Null))
}

fn step_world(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: WorldRef = params(args)?;
    Ok(Outcome::success(ctx.runtime.step_world(&p.world_uid)?))
}

fn get_available_worldadapters(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: WorldRef = params(args)?;
    let adapters = ctx.runtime.get_available_worldadapters(&p.world_uid)?;
    Ok(Outcome::success(encode(adapters)?))
}

fn spawn_agent(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        world_uid: String,
        worldadapter: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        config: Config,
    }
    let p: Params = params(args)?;
    let uid = ctx
        .runtime
        .spawn_agent(&p.world_uid, &p.worldadapter, p.name, p.config)?;
    Ok(Outcome::success(uid))
}

fn get_worldadapter_values(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: AgentRef = params(args)?;
    let snapshot = ctx
        .runtime
        .get_worldadapter_values(&p.world_uid, &p.agent_uid)?;
    Ok(Outcome::success(encode(snapshot)?))
}

fn set_datatarget_values(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        world_uid: String,
        agent_uid: String,
        values: Vec<f64>,
    }
    let p: Params = params(args)?;
    ctx.runtime
        .set_datatarget_values(&p.world_uid, &p.agent_uid, &p.values)?;
    Ok(Outcome::success(Value::Null))
}

fn get_available_nodenets(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    no_params(args)?;
    Ok(Outcome::success(encode(ctx.runtime.get_available_nodenets())?))
}

fn get_nodenet(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: NodenetRef = params(args)?;
    Ok(Outcome::success(encode(ctx.runtime.get_nodenet(&p.nodenet_uid)?)?))
}

fn new_nodenet(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        name: String,
        #[serde(default)]
        world_uid: Option<String>,
        #[serde(default)]
        worldadapter: Option<String>,
    }
    let p: Params = params(args)?;
    if p.world_uid.is_some() != p.worldadapter.is_some() {
        return Err(RpcError::BadParameters(
            "world_uid and worldadapter must be given together".to_string(),
        ));
    }
    let owner = ctx.owner();
    let uid = ctx.runtime.new_nodenet(
        &p.name,
        &owner,
        p.world_uid.as_deref(),
        p.worldadapter.as_deref(),
    )?;
    Ok(Outcome::success(uid))
}

fn delete_nodenet(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: NodenetRef = params(args)?;
    ctx.runtime.delete_nodenet(&p.nodenet_uid)?;
    Ok(Outcome::success(Value::Null))
}

fn add_node(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        nodenet_uid: String,
        name: String,
        kind: NodeKind,
    }
    let p: Params = params(args)?;
    Ok(Outcome::success(ctx.runtime.add_node(&p.nodenet_uid, &p.name, p.kind)?))
}

fn add_link(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        nodenet_uid: String,
        source: String,
        target: String,
        #[serde(default = "unit_weight")]
        weight: f64,
    }
    fn unit_weight() -> f64 {
        1.0
    }
    let p: Params = params(args)?;
    let uid = ctx
        .runtime
        .add_link(&p.nodenet_uid, &p.source, &p.target, p.weight)?;
    Ok(Outcome::success(uid))
}

fn set_node_activation(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Params {
        nodenet_uid: String,
        node_uid: String,
        activation: f64,
    }
    let p: Params = params(args)?;
    ctx.runtime
        .set_node_activation(&p.nodenet_uid, &p.node_uid, p.activation)?;
    Ok(Outcome::success(Value::Null))
}

fn step_nodenet(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: NodenetRef = params(args)?;
    Ok(Outcome::success(ctx.runtime.step_nodenet(&p.nodenet_uid)?))
}

fn start_nodenetrunner(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: NodenetRef = params(args)?;
    match ctx.runtime.start_nodenetrunner(&p.nodenet_uid) {
        Ok(()) => {
            info!(nodenet = %p.nodenet_uid, user = ?ctx.user_id, "runner started over rpc");
            Ok(Outcome::success(Value::Null))
        }
        Err(err @ runtime::RuntimeError::NotBound(_)) => Ok(Outcome::error(err.to_string())),
        Err(err) => Err(err.into()),
    }
}

fn stop_nodenetrunner(ctx: &mut Context<'_>, args: Args) -> Result<Outcome, RpcError> {
    let p: NodenetRef = params(args)?;
    ctx.runtime.stop_nodenetrunner(&p.nodenet_uid)?;
    Ok(Outcome::success(Value::Null))
}
