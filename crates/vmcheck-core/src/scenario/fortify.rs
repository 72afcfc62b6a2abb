//! Desktop suite: privilege boundaries, silent output, ACL lifecycle and the
//! preconfigured apps of the session user.

use vmcheck_constants::{env, markers::SANDBOX_OK, session::BOOT_TARGET};

use super::{
    Context, MEDIUM, SHORT, Scenario, expect_output, launch_check, print_version,
    wait_for_compositor,
};
use crate::enablement::Enablements;
use crate::error::Result;
use crate::identity::Identity;
use crate::shell::{quote, sudo_login};
use crate::verifier::ExpectedLaunch;

/// Identity of ad-hoc `run -a 0` launches.
const PERMISSIVE: Identity = Identity::new(0);

/// Flag sets whose helpers must stay quiet when the sandbox is interrupted.
const INTERRUPT_FLAGS: [&str; 3] = ["", "--dbus ", "--wayland -X --dbus --pulse "];

/// Check helpers launched before the apps, each consuming one identity.
const CHECK_PRESETS: [&str; 3] = ["preset", "tty", "mapuid"];

/// A preconfigured app launched through its `<name>-start` wrapper.
struct App {
    name: &'static str,
    /// Slot after the check presets this app's identity is configured at.
    offset: u32,
    /// Command typed into the app's terminal, proving the integration works.
    probe: &'static str,
    marker: &'static str,
    state: &'static str,
    process: &'static str,
    enablements: Enablements,
    acl: bool,
}

const NE_FOOT: App = App {
    name: "ne-foot",
    offset: 0,
    probe: "wayland-info",
    marker: "client-ok",
    state: "foot_wayland",
    process: "foot",
    enablements: Enablements::WAYLAND,
    acl: true,
};

const PA_FOOT: App = App {
    name: "pa-foot",
    offset: 1,
    probe: "pactl info",
    marker: "pulse-ok",
    state: "pulse_wayland",
    process: "foot",
    enablements: Enablements::from_bits(Enablements::WAYLAND.bits() | Enablements::PULSE.bits()),
    acl: false,
};

const X11_ALACRITTY: App = App {
    name: "x11-alacritty",
    offset: 2,
    probe: "glinfo",
    marker: "x11-ok",
    state: "alacritty_x11",
    process: "alacritty",
    enablements: Enablements::X11,
    acl: false,
};

const DA_FOOT: App = App {
    name: "da-foot",
    offset: 3,
    probe: "wayland-info",
    marker: "direct-ok",
    state: "foot_direct",
    process: "foot",
    enablements: Enablements::WAYLAND,
    acl: true,
};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("boot", boot),
        Scenario::new("deny-unmapped-uid", deny_unmapped_uid),
        Scenario::new("direct-helper-call", direct_helper_call),
        Scenario::new("sandbox-checks", sandbox_checks),
        Scenario::new("permissive-defaults", permissive_defaults),
        Scenario::new("silent-output", silent_output),
        Scenario::new("silent-output-interrupt", silent_output_interrupt),
        Scenario::new("bad-wayland-display", bad_wayland_display),
        Scenario::new("dbus-notification", dbus_notification),
        Scenario::new("acl-revocation", acl_revocation),
        Scenario::new("wayland-app", |ctx| run_app(ctx, &NE_FOOT)),
        Scenario::new("wayland-app-terminal", wayland_app_from_terminal),
        Scenario::new("pulseaudio-app", |ctx| run_app(ctx, &PA_FOOT)),
        Scenario::new("xwayland-app", |ctx| run_app(ctx, &X11_ALACRITTY)),
        Scenario::new("direct-wayland-app", |ctx| run_app(ctx, &DA_FOOT)),
        Scenario::new("syscall-filter", syscall_filter),
        Scenario::new("teardown", teardown),
    ]
}

/// Boots, starts the tool's own test suite in the background and waits for sway.
pub fn boot(ctx: &mut Context) -> Result<()> {
    let guest = ctx.guest();
    guest.wait_for_unit(BOOT_TARGET, guest.poller().timeout())?;

    let session = &ctx.config().session;
    let tool = &ctx.config().tool;
    guest.succeed(&format!(
        "{} &> {} &",
        sudo_login(&session.untrusted_user, &[], &tool.go_test_command),
        quote(&tool.go_test_log)
    ))?;

    print_version(ctx)?;
    wait_for_compositor(ctx)
}

/// A user the setuid helper does not know is refused with exact messages.
pub fn deny_unmapped_uid(ctx: &mut Context) -> Result<()> {
    let session = &ctx.config().session;
    let tool = &ctx.config().tool;
    let helper = &tool.setuid_helper;
    let denied = format!(
        "{helper}: uid {} is not in the {helper}rc file\n",
        session.untrusted_uid
    );

    let plain = sudo_login(&session.untrusted_user, &[], &ctx.tool("run &>/dev/stdout"));
    let output = ctx.guest().fail(&plain)?;
    tracing::info!("{}", output.trim_end());

    let verbose = sudo_login(
        &session.untrusted_user,
        &[],
        &ctx.tool("-v run &>/dev/stdout"),
    );
    let verbose_output = ctx.guest().fail(&verbose)?;
    tracing::info!("{}", verbose_output.trim_end());

    expect_output(&plain, &denied, &output)?;
    expect_output(
        &verbose,
        &format!(
            "{denied}{}: *cannot obtain uid from {helper}: permission denied\n",
            tool.binary
        ),
        &verbose_output,
    )
}

/// The setuid helper refuses to be called directly.
pub fn direct_helper_call(ctx: &mut Context) -> Result<()> {
    let output = ctx
        .guest()
        .fail(&ctx.as_session(&ctx.config().tool.setuid_helper))?;
    tracing::info!("{}", output.trim_end());
    Ok(())
}

/// Each check preset runs under the next identity and leaves its marker there.
pub fn sandbox_checks(ctx: &mut Context) -> Result<()> {
    for name in CHECK_PRESETS {
        let identity = ctx.ids_mut().next_identity();
        launch_check(ctx, name)?;
        ctx.guest()
            .wait_for_file(&ctx.ids().path_of(identity, SANDBOX_OK), MEDIUM)?;
    }
    Ok(())
}

/// Permissive defaults work outside the Wayland session.
pub fn permissive_defaults(ctx: &mut Context) -> Result<()> {
    let output = ctx
        .guest()
        .succeed(&ctx.as_session(&ctx.tool("-v run -a 0 touch /tmp/pd-bare-ok")))?;
    tracing::info!("{}", output.trim_end());
    ctx.guest()
        .wait_for_file(&ctx.ids().path_of(PERMISSIVE, "pd-bare-ok"), SHORT)
}

/// A successful non-verbose run prints nothing.
pub fn silent_output(ctx: &mut Context) -> Result<()> {
    let command = ctx.as_session(&ctx.tool("run -a 0 true &>/dev/stdout"));
    let output = ctx.guest().succeed(&command)?;
    expect_output(&command, "", &output)
}

/// An interrupted non-verbose run prints nothing, whatever helpers it started.
pub fn silent_output_interrupt(ctx: &mut Context) -> Result<()> {
    for flags in INTERRUPT_FLAGS {
        ctx.guest()
            .nested(&format!("interrupting run with flags {flags:?}"), || {
                interrupt_silently(ctx, flags)
            })?;
    }
    Ok(())
}

fn interrupt_silently(ctx: &Context, flags: &str) -> Result<()> {
    let guest = ctx.guest();
    let user = &ctx.config().session.user;

    ctx.channel().exec("foot")?;
    ctx.wait_for_window(&ctx.terminal_title(user))?;

    // identity 0 has no home-manager profile
    let ready = ctx.ids().path_of(PERMISSIVE, "pd-silent-ready");
    guest.send_chars(&format!(
        "exec {} &>/tmp/pd-silent\n",
        ctx.tool(&format!(
            "run {flags}-a 0 sh -c 'export PATH=/run/current-system/sw/bin:$PATH && touch /tmp/pd-silent-ready && sleep infinity'"
        ))
    ))?;
    guest.wait_for_file(&ready, MEDIUM)?;
    guest.succeed(&format!("rm {}", quote(&ready)))?;

    guest.send_key("ctrl-c")?;
    guest.wait_until_fails("pgrep foot", SHORT)?;
    guest.wait_until_fails(
        &format!(
            "pgrep -u {} -f {}",
            quote(user),
            quote(&format!("{} run {flags}-a 0 ", ctx.config().tool.binary))
        ),
        SHORT,
    )?;

    let command = "cat /tmp/pd-silent && rm /tmp/pd-silent";
    let output = guest.succeed(command)?;
    expect_output(command, "", &output)
}

/// Requesting Wayland outside the session fails gracefully.
pub fn bad_wayland_display(ctx: &mut Context) -> Result<()> {
    let output = ctx
        .guest()
        .fail(&ctx.as_session(&ctx.tool("-v run --wayland true")))?;
    tracing::info!("{}", output.trim_end());
    Ok(())
}

/// A sandboxed client reaches the session bus notification daemon.
pub fn dbus_notification(ctx: &mut Context) -> Result<()> {
    ctx.channel().exec(&ctx.tool(
        r#"-v run --wayland --dbus notify-send -a "NixOS Tests" "Test notification" "Notification from within sandbox." && touch /tmp/dbus-ok"#,
    ))?;
    ctx.guest().wait_for_file("/tmp/dbus-ok", MEDIUM)?;
    ctx.verifier()
        .collect_state(&ctx.channel(), "dbus_notify_exited")?;
    ctx.guest().succeed("pkill -9 mako")?;
    Ok(())
}

/// The runtime dir entry of an identity outlives the first of two
/// overlapping instances and disappears with the second.
pub fn acl_revocation(ctx: &mut Context) -> Result<()> {
    let guest = ctx.guest();
    let acl = ctx.runtime_acl();
    let subject = ctx.ids().subject_of(PERMISSIVE);

    for user in ["p0", "p1"] {
        ctx.channel().exec(&ctx.tool(&format!(
            "-v run --wayland -X --dbus --pulse -u {user} foot && touch /tmp/{user}-exit-ok"
        )))?;
        ctx.wait_for_window(&ctx.terminal_title(user))?;
        acl.assert_present(subject)?;
    }

    // p1 has focus
    guest.send_chars("exit\n")?;
    guest.wait_for_file("/tmp/p1-exit-ok", MEDIUM)?;
    acl.assert_present(subject)?;

    guest.send_chars("exit\n")?;
    guest.wait_for_file("/tmp/p0-exit-ok", MEDIUM)?;
    acl.wait_until_absent(subject, SHORT)
}

fn run_app(ctx: &mut Context, app: &App) -> Result<()> {
    let guest = ctx.guest();
    let identity = ctx.ids().identity_at(app.offset);
    let subject = ctx.ids().subject_of(identity);

    ctx.channel().exec(app.name)?;
    ctx.wait_for_window(&ctx.terminal_title(&format!("u0_a{identity}")))?;
    guest.send_chars(&format!(
        "clear; {} && touch /tmp/{}\n",
        app.probe, app.marker
    ))?;
    guest.wait_for_file(&ctx.ids().path_of(identity, app.marker), MEDIUM)?;

    let verifier = ctx.verifier();
    verifier.collect_state(&ctx.channel(), app.state)?;
    verifier.check_single_instance(
        &ExpectedLaunch::wrapper(app.name, ctx.config().tool.store_prefix.clone()),
        app.enablements,
    )?;
    if app.acl {
        ctx.runtime_acl().assert_present(subject)?;
    }

    guest.send_chars("exit\n")?;
    guest.wait_until_fails(&format!("pgrep {}", app.process), SHORT)?;
    if app.acl {
        ctx.runtime_acl().wait_until_absent(subject, SHORT)?;
    }
    Ok(())
}

/// The Wayland app started from a terminal is visible to `show`.
pub fn wayland_app_from_terminal(ctx: &mut Context) -> Result<()> {
    let guest = ctx.guest();
    let identity = ctx.ids().identity_at(NE_FOOT.offset);
    let tool = &ctx.config().tool.binary;

    ctx.channel().exec(&format!(
        "foot $SHELL -c '({}) & sleep 1 && {tool} show $({tool} ps --short) && touch /tmp/ps-show-ok && cat'",
        NE_FOOT.name
    ))?;
    ctx.wait_for_window(&ctx.terminal_title(&format!("u0_a{identity}")))?;
    guest.send_chars("clear; wayland-info && touch /tmp/term-ok\n")?;
    guest.wait_for_file(&ctx.ids().path_of(identity, "term-ok"), MEDIUM)?;
    guest.wait_for_file("/tmp/ps-show-ok", SHORT)?;

    let verifier = ctx.verifier();
    verifier.collect_state(&ctx.channel(), "foot_wayland_term")?;
    verifier.check_single_instance(
        &ExpectedLaunch::wrapper(NE_FOOT.name, ctx.config().tool.store_prefix.clone()),
        NE_FOOT.enablements,
    )?;

    guest.send_chars("exit\n")?;
    ctx.wait_for_window("foot")?;
    guest.send_key("ctrl-c")?;
    guest.wait_until_fails("pgrep foot", SHORT)?;
    Ok(())
}

/// A program tripping the syscall filter is killed.
pub fn syscall_filter(ctx: &mut Context) -> Result<()> {
    let session = &ctx.config().session;
    let output = ctx.guest().fail(&sudo_login(
        &session.user,
        &[(env::XDG_RUNTIME_DIR, &session.runtime_dir)],
        "strace-failure",
    ))?;
    tracing::info!("{}", output.trim_end());
    Ok(())
}

/// Exits sway and waits for the background test suite to pass.
pub fn teardown(ctx: &mut Context) -> Result<()> {
    super::teardown(ctx)?;

    let guest = ctx.guest();
    let tool = &ctx.config().tool;
    guest.wait_for_file(&tool.go_test_log, SHORT)?;
    let log = guest.succeed(&format!("cat {}", quote(&tool.go_test_log)))?;
    tracing::info!("go test output:\n{}", log.trim_end());
    guest.wait_for_file(&tool.go_test_ok, SHORT)
}
