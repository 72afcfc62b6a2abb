//! Container suite: syscall filters, capabilities in the user namespace and
//! the container check presets.

use vmcheck_constants::markers::CHECK_OK_PREFIX;

use super::{Context, Scenario, boot, launch_check, renamed_tool_config, teardown};
use crate::config::Config;
use crate::error::Result;
use crate::filter::PID_TIMEOUT;

/// Check presets, in identity order.
const CHECK_PRESETS: [&str; 6] = ["pd", "preset", "tty", "mapuid", "device", "pdlike"];

/// Writable store overlay the check presets mount.
const STORE_OVERLAY: &str = "/tmp/.hakurei-store-rw";

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("boot", boot),
        Scenario::new("default-filter", default_filter),
        Scenario::new("user-namespace-capabilities", capabilities),
        Scenario::new("check-presets", check_presets),
        Scenario::new("teardown", teardown),
    ]
}

/// Configuration of the renamed tool with identities counted from 0.
#[must_use]
pub fn default_config() -> Config {
    renamed_tool_config(0)
}

/// A plain run gets the permissive-defaults filter.
pub fn default_filter(ctx: &mut Context) -> Result<()> {
    ctx.channel().exec(&ctx.tool("run cat"))?;
    let report = ctx
        .filter()
        .check_filter(ctx.ids().identity_at(0), "pdlike", "cat")?;
    tracing::debug!("{}", report.trim_end());
    Ok(())
}

/// The sandbox holds no capabilities and cannot unmount `/dev`.
pub fn capabilities(ctx: &mut Context) -> Result<()> {
    let guest = ctx.guest();
    for args in ["capsh --print", "capsh --has-no-new-privs"] {
        let output = guest.succeed(&ctx.as_session(&ctx.tool(&format!("run {args}"))))?;
        tracing::info!("{}", output.trim_end());
    }
    for set in ['a', 'b', 'i', 'p'] {
        guest.fail(&ctx.as_session(
            &ctx.tool(&format!("run capsh --has-{set}=CAP_SYS_ADMIN")),
        ))?;
    }
    guest.fail(&ctx.as_session(&ctx.tool("run umount -R /dev")))?;
    Ok(())
}

/// Each preset runs under the next identity, reports success and carries its filter.
pub fn check_presets(ctx: &mut Context) -> Result<()> {
    ctx.guest().succeed(&format!(
        "install -dm0777 {STORE_OVERLAY}/upper {STORE_OVERLAY}/work"
    ))?;

    let process = ctx.config().tool.filter_tool.clone();
    for name in CHECK_PRESETS {
        let identity = ctx.ids_mut().next_identity();
        launch_check(ctx, name)?;
        ctx.guest()
            .wait_for_file(&format!("{CHECK_OK_PREFIX}{identity}"), PID_TIMEOUT)?;
        ctx.filter().check_filter(identity, name, &process)?;
    }
    Ok(())
}
