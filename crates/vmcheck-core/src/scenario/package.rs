//! Package suite: install an app bundle with the package tool and launch it.

use super::{Context, Scenario, boot, renamed_tool_config, teardown};
use crate::config::Config;
use crate::enablement::Enablements;
use crate::error::Result;
use crate::verifier::ExpectedLaunch;

/// Package manager shipped with the tool.
const PACKAGE_TOOL: &str = "fpkg";

/// Bundle installed by the suite.
const BUNDLE: &str = "/etc/foot.pkg";

/// Application id of the bundle.
const APP_ID: &str = "org.codeberg.dnkl.foot";

/// Name the bundle's store paths are built under.
const APP_NAME: &str = "foot";

/// Identity the bundle is configured with.
const APP_IDENTITY: u32 = 2;

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("boot", boot),
        Scenario::new("install-package", install_package),
        Scenario::new("start-package", start_package),
        Scenario::new("teardown", teardown),
    ]
}

/// Configuration of the renamed tool, predicting the bundle's identity.
#[must_use]
pub fn default_config() -> Config {
    renamed_tool_config(APP_IDENTITY)
}

/// Prepares the package directory and installs the bundle.
pub fn install_package(ctx: &mut Context) -> Result<()> {
    let session = &ctx.config().session;
    ctx.guest().succeed(&format!(
        "install -dm 0700 -o {} -g users /var/lib/{}/{}",
        session.user,
        ctx.config().tool.binary,
        session.uid
    ))?;

    ctx.channel().exec(&format!(
        "{PACKAGE_TOOL} -v install {BUNDLE} && touch /tmp/fpkg-install-done"
    ))?;
    ctx.wait_for_file("/tmp/fpkg-install-done")
}

/// Starts the installed app and checks its state and ACL lifecycle.
pub fn start_package(ctx: &mut Context) -> Result<()> {
    let guest = ctx.guest();
    let config = ctx.config();

    ctx.channel()
        .exec(&format!("{PACKAGE_TOOL} -v start {APP_ID}"))?;
    ctx.wait_for_window(&format!(
        "{}-{APP_NAME}",
        ctx.terminal_title(&config.tool.binary)
    ))?;
    guest.send_chars("clear; wayland-info && touch /tmp/success-client\n")?;
    ctx.wait_for_file(&ctx.ids().predicted_path(0, "success-client"))?;

    let verifier = ctx.verifier();
    verifier.collect_state(&ctx.channel(), "app_wayland")?;
    verifier.check_single_instance(
        &ExpectedLaunch::package(APP_NAME, &config.tool.binary, &config.tool.store_prefix),
        Enablements::WAYLAND | Enablements::DBUS | Enablements::PULSE,
    )?;

    let subject = ctx.ids().predicted_acl_subject(0);
    let acl = ctx.runtime_acl();
    acl.assert_present(subject)?;

    guest.send_chars("exit\n")?;
    guest.wait_until_fails("pgrep foot", guest.poller().timeout())?;
    acl.wait_until_absent(subject, guest.poller().timeout())
}
