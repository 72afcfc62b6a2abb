//! Simulated guest for E2E tests.
//!
//! [`SimulatedVm`] is a [`Machine`] whose answers come from an in-memory model
//! of the guest: files, open windows, the processes behind them and the ACL
//! entries those processes hold. Commands and keystrokes mutate the model the
//! way the real session would, so whole suites run without a VM. [`Fault`]s
//! make the model misbehave in one specific way.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use serde_json::Value;
use vmcheck_core::machine::{ExecOutput, Machine};
use vmcheck_core::{Config, Enablements, Identity, IdentityScheme};

use crate::fixtures;

/// Check presets the desktop suite launches before its apps.
const DESKTOP_CHECKS: u32 = 3;

/// One way the simulated guest can misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The named app reports these enablements instead of its own.
    WrongEnablements(&'static str, Enablements),
    /// Every instance is listed twice.
    DuplicateInstances,
    /// ACL entries are never revoked.
    AclLeak,
    /// Interrupted runs leave output behind.
    NoisyInterrupt,
    /// The setuid helper accepts the untrusted user.
    AcceptUntrusted,
    /// The filter tool reports a mismatch for every pid.
    FilterMismatch,
}

/// Sandboxed app the model knows how to launch.
#[derive(Debug, Clone, Copy)]
struct AppSpec {
    launcher: &'static str,
    offset: u32,
    process: &'static str,
    enablements: Enablements,
    packaged: bool,
}

const APPS: [AppSpec; 5] = [
    AppSpec {
        launcher: "ne-foot",
        offset: 0,
        process: "foot",
        enablements: Enablements::WAYLAND,
        packaged: false,
    },
    AppSpec {
        launcher: "pa-foot",
        offset: 1,
        process: "foot",
        enablements: Enablements::from_bits(9),
        packaged: false,
    },
    AppSpec {
        launcher: "x11-alacritty",
        offset: 2,
        process: "alacritty",
        enablements: Enablements::X11,
        packaged: false,
    },
    AppSpec {
        launcher: "da-foot",
        offset: 3,
        process: "foot",
        enablements: Enablements::WAYLAND,
        packaged: false,
    },
    AppSpec {
        launcher: "foot",
        offset: 0,
        process: "foot",
        enablements: Enablements::from_bits(13),
        packaged: true,
    },
];

#[derive(Debug, Clone)]
struct Window {
    title: String,
    process: &'static str,
    /// Identity whose ACL entry the window's sandbox holds.
    identity: Option<u32>,
    app: Option<AppSpec>,
}

#[derive(Debug)]
struct World {
    tool: String,
    helper: String,
    filter_tool: String,
    untrusted_uid: u32,
    hostname: String,
    tmpdir_root: String,
    scheme: IdentityScheme,
    first_identity: u32,
    next_check: u32,
    files: BTreeSet<String>,
    windows: Vec<Window>,
    /// `(owner uid, name)` of background sandboxed processes.
    processes: Vec<(u32, String)>,
    leaked: BTreeSet<u32>,
    faults: Vec<Fault>,
    log: Vec<String>,
}

/// Machine backed by a model of the guest session.
#[derive(Clone)]
pub struct SimulatedVm {
    world: Rc<RefCell<World>>,
}

impl SimulatedVm {
    /// Creates a freshly booted guest matching `config`.
    pub fn new(config: &Config) -> Self {
        let world = World {
            tool: config.tool.binary.clone(),
            helper: config.tool.setuid_helper.clone(),
            filter_tool: config.tool.filter_tool.clone(),
            untrusted_uid: config.session.untrusted_uid,
            hostname: config.session.hostname.clone(),
            tmpdir_root: config.tool.tmpdir_root.clone(),
            scheme: config.identity.scheme,
            first_identity: config.identity.first,
            next_check: config.identity.first,
            files: [config.session.wayland_socket(), config.session.ipc_socket.clone()]
                .into_iter()
                .collect(),
            windows: Vec::new(),
            processes: Vec::new(),
            leaked: BTreeSet::new(),
            faults: Vec::new(),
            log: Vec::new(),
        };
        Self {
            world: Rc::new(RefCell::new(world)),
        }
    }

    /// Makes the guest misbehave.
    pub fn inject(&self, fault: Fault) {
        self.world.borrow_mut().faults.push(fault);
    }

    /// Everything the harness did, in order: commands, `chars:` and `key:` entries.
    pub fn log(&self) -> Vec<String> {
        self.world.borrow().log.clone()
    }

    /// Counts logged entries containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.log().iter().filter(|e| e.contains(pattern)).count()
    }

    /// Returns true if the guest file exists.
    pub fn has_file(&self, path: &str) -> bool {
        self.world.borrow().files.contains(path)
    }

    /// Titles of the open windows, oldest first.
    pub fn windows(&self) -> Vec<String> {
        self.world
            .borrow()
            .windows
            .iter()
            .map(|w| w.title.clone())
            .collect()
    }
}

impl Machine for SimulatedVm {
    fn execute(&self, command: &str) -> vmcheck_core::Result<ExecOutput> {
        let mut world = self.world.borrow_mut();
        world.log.push(command.to_string());
        Ok(world.execute(command))
    }

    fn send_chars(&self, chars: &str) -> vmcheck_core::Result<()> {
        let mut world = self.world.borrow_mut();
        world.log.push(format!("chars:{chars}"));
        world.type_into_focus(chars);
        Ok(())
    }

    fn send_key(&self, key: &str) -> vmcheck_core::Result<()> {
        let mut world = self.world.borrow_mut();
        world.log.push(format!("key:{key}"));
        if key == "ctrl-c" {
            world.windows.pop();
        }
        Ok(())
    }

    fn screenshot(&self, name: &str) -> vmcheck_core::Result<()> {
        self.world.borrow_mut().log.push(format!("screenshot:{name}"));
        Ok(())
    }

    fn copy_from_vm(&self, path: &str, _target_dir: &str) -> vmcheck_core::Result<()> {
        self.world.borrow_mut().log.push(format!("copy:{path}"));
        Ok(())
    }
}

fn ok(stdout: impl Into<String>) -> ExecOutput {
    ExecOutput::ok(stdout)
}

fn failed(stdout: impl Into<String>) -> ExecOutput {
    ExecOutput::failed(1, stdout)
}

fn unquote(word: &str) -> String {
    word.trim().trim_matches('\'').to_string()
}

impl World {
    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn path_of(&self, identity: u32, leaf: &str) -> String {
        format!("{}/{identity}/{leaf}", self.tmpdir_root)
    }

    fn subject(&self, identity: u32) -> u32 {
        self.scheme.subject(Identity::new(identity))
    }

    fn app_identity(&self, app: &AppSpec) -> u32 {
        if app.packaged {
            self.first_identity + app.offset
        } else {
            self.first_identity + DESKTOP_CHECKS + app.offset
        }
    }

    fn execute(&mut self, cmd: &str) -> ExecOutput {
        let tool = self.tool.clone();

        if cmd.starts_with("systemctl is-active") {
            return ok("active\n");
        }
        if let Some(path) = cmd.strip_prefix("test -e ") {
            return if self.files.contains(&unquote(path)) {
                ok("")
            } else {
                failed("")
            };
        }
        if cmd.contains("swaymsg") {
            return self.swaymsg(cmd);
        }
        if cmd.starts_with("getfacl") {
            return ok(self.acl());
        }
        if cmd.contains(&format!("{tool} --json ps")) {
            return ok(self.listing());
        }
        if cmd.contains(&format!("{tool} version")) {
            return ok("0.3.0\n");
        }
        if cmd.contains("-go-test &>") {
            self.files.insert("/tmp/go-test".to_string());
            self.files.insert("/tmp/go-test-ok".to_string());
            return ok("");
        }
        if cmd.starts_with("sudo -u untrusted") {
            if self.has(Fault::AcceptUntrusted) {
                return ok("");
            }
            let text = if cmd.contains(" -v run") {
                fixtures::deny_output_verbose(&tool, &self.helper, self.untrusted_uid)
            } else {
                fixtures::deny_output(&self.helper, self.untrusted_uid)
            };
            return failed(text);
        }
        if cmd.ends_with(&format!(" {}", self.helper)) {
            return failed("");
        }
        if cmd.contains("touch /tmp/pd-bare-ok") {
            let path = self.path_of(0, "pd-bare-ok");
            self.files.insert(path);
            return ok("");
        }
        if cmd.contains("run -a 0 true") {
            return ok("");
        }
        if cmd.contains("run --wayland true") {
            return failed("");
        }
        if cmd.contains("capsh --print") || cmd.contains("capsh --has-no-new-privs") {
            return ok("Current: =\n");
        }
        if cmd.contains("capsh --has-") || cmd.contains("umount") {
            return failed("");
        }
        if cmd.contains("strace-failure") {
            return ExecOutput::failed(159, "");
        }
        if let Some(path) = cmd.strip_prefix("rm ") {
            self.files.remove(&unquote(path));
            return ok("");
        }
        if cmd.starts_with("pgrep -U") {
            return self.pgrep_owner(cmd);
        }
        if cmd.starts_with("pgrep -a") {
            return ok("");
        }
        if cmd.starts_with("pgrep -u") {
            return failed("");
        }
        if let Some(name) = cmd.strip_prefix("pgrep ") {
            return if self.windows.iter().any(|w| w.process == name.trim()) {
                ok("4242\n")
            } else {
                failed("")
            };
        }
        if cmd.starts_with("cat /tmp/pd-silent") {
            self.files.remove("/tmp/pd-silent");
            return ok(if self.has(Fault::NoisyInterrupt) {
                "^C\n"
            } else {
                ""
            });
        }
        if cmd.starts_with("cat ") {
            return ok("PASS\n");
        }
        if cmd.starts_with("pkill") || cmd.starts_with("install -d") {
            return ok("");
        }
        if cmd.starts_with("find ") {
            return ok(format!("{}\n", unquote(&cmd[5..])));
        }
        if cmd.ends_with(" hash") {
            return ok("9f86d081884c7d65\n");
        }
        if cmd.contains(" filter ") {
            return if self.has(Fault::FilterMismatch) {
                failed("filter mismatch\n")
            } else {
                ok("filter matches\n")
            };
        }
        ExecOutput::failed(127, "command not found\n")
    }

    fn swaymsg(&mut self, cmd: &str) -> ExecOutput {
        const SUCCESS: &str = r#"[{"success":true}]"#;
        let tool = self.tool.clone();

        if cmd.contains("-t get_tree") {
            let windows: Vec<(&str, &str)> = self
                .windows
                .iter()
                .map(|w| (w.title.as_str(), w.process))
                .collect();
            return ok(fixtures::sway_tree(&windows));
        }
        if cmd.contains("-- exit") {
            self.windows.clear();
            self.files.insert("/tmp/sway-exit-ok".to_string());
            return failed("");
        }

        if let Some(rest) = cmd.split("check-sandbox-").nth(1) {
            let identity = self.next_check;
            self.next_check += 1;
            let name: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
            if tool == "fortify" {
                let path = self.path_of(identity, "sandbox-ok");
                self.files.insert(path);
            } else {
                self.files
                    .insert(format!("/var/tmp/.hakurei-check-ok.{identity}"));
                let owner = self.subject(identity);
                let process = self.filter_tool.clone();
                self.processes.push((owner, process));
            }
            tracing::debug!("check preset {} runs as identity {}", name, identity);
        } else if cmd.contains(" show $(") {
            self.open_terminal("foot".to_string(), None);
            self.launch("ne-foot");
            self.files.insert("/tmp/ps-show-ok".to_string());
        } else if cmd.contains("notify-send") {
            self.files.insert("/tmp/dbus-ok".to_string());
        } else if let Some(user) = ["p0", "p1"]
            .into_iter()
            .find(|u| cmd.contains(&format!("-u {u} foot")))
        {
            let title = format!("{user}@{}:~", self.hostname);
            self.open_terminal(title, Some(0));
        } else if cmd.contains(&format!("exec {tool} run cat")) {
            let owner = self.subject(self.first_identity);
            self.processes.push((owner, "cat".to_string()));
        } else if cmd.contains("fpkg -v install") {
            self.files.insert("/tmp/fpkg-install-done".to_string());
        } else if cmd.contains("fpkg -v start") {
            self.launch("foot");
        } else if cmd.contains("exec foot'") {
            let title = format!("alice@{}:~", self.hostname);
            self.open_terminal(title, None);
        } else if let Some(app) = APPS
            .iter()
            .find(|a| !a.packaged && cmd.contains(&format!("exec {}'", a.launcher)))
        {
            self.launch(app.launcher);
        }
        ok(SUCCESS)
    }

    fn open_terminal(&mut self, title: String, identity: Option<u32>) {
        if let Some(identity) = identity {
            let subject = self.subject(identity);
            self.leaked.insert(subject);
        }
        self.windows.push(Window {
            title,
            process: "foot",
            identity,
            app: None,
        });
    }

    fn launch(&mut self, launcher: &str) {
        let Some(app) = APPS.iter().find(|a| a.launcher == launcher).copied() else {
            return;
        };
        let identity = self.app_identity(&app);
        let title = if app.packaged {
            format!("{}@{}-{}", self.tool, self.hostname, app.launcher)
        } else {
            format!("u0_a{identity}@{}:~", self.hostname)
        };
        let subject = self.subject(identity);
        self.leaked.insert(subject);
        self.windows.push(Window {
            title,
            process: app.process,
            identity: Some(identity),
            app: Some(app),
        });
    }

    fn type_into_focus(&mut self, chars: &str) {
        if chars.contains("pd-silent-ready") {
            let path = self.path_of(0, "pd-silent-ready");
            self.files.insert(path);
            self.files.insert("/tmp/pd-silent".to_string());
            return;
        }
        if chars == "exit\n" {
            if let Some(window) = self.windows.pop() {
                if let Some(user) = window.title.split('@').next().filter(|u| u.starts_with('p')) {
                    self.files.insert(format!("/tmp/{user}-exit-ok"));
                }
            }
            return;
        }
        if let Some(marker) = chars.split("touch /tmp/").nth(1) {
            let marker = marker.trim_end();
            if let Some(identity) = self.windows.last().and_then(|w| w.identity) {
                let path = self.path_of(identity, marker);
                self.files.insert(path);
            }
        }
    }

    fn pgrep_owner(&self, cmd: &str) -> ExecOutput {
        let words: Vec<&str> = cmd.split_whitespace().collect();
        let (Some(owner), Some(name)) = (
            words.get(2).and_then(|w| w.parse::<u32>().ok()),
            words.get(4).map(|w| unquote(w)),
        ) else {
            return ExecOutput::failed(2, "");
        };
        let pids: Vec<String> = self
            .processes
            .iter()
            .enumerate()
            .filter(|(_, (uid, n))| *uid == owner && *n == name)
            .map(|(i, _)| (100 + i).to_string())
            .collect();
        if pids.is_empty() {
            failed("")
        } else {
            ok(format!("{}\n", pids.join("\n")))
        }
    }

    fn acl(&self) -> String {
        let mut subjects: BTreeSet<u32> = self
            .windows
            .iter()
            .filter_map(|w| w.identity)
            .map(|id| self.subject(id))
            .collect();
        if self.has(Fault::AclLeak) {
            subjects.extend(self.leaked.iter().copied());
        }
        fixtures::acl_listing(&subjects.into_iter().collect::<Vec<_>>())
    }

    fn listing(&self) -> String {
        let mut records: Vec<Value> = Vec::new();
        for app in self.windows.iter().filter_map(|w| w.app) {
            let enablements = self
                .faults
                .iter()
                .find_map(|f| match f {
                    Fault::WrongEnablements(name, e) if *name == app.launcher => Some(*e),
                    _ => None,
                })
                .unwrap_or(app.enablements);
            let record = if app.packaged {
                fixtures::package_record(&self.tool, app.launcher, enablements.bits())
            } else {
                fixtures::confined_record(app.launcher, enablements.bits())
            };
            if self.has(Fault::DuplicateInstances) {
                records.push(record.clone());
            }
            records.push(record);
        }
        fixtures::keyed_listing(&records)
    }
}
