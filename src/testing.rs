//! In-memory host for stage and step tests
//!
//! `FakeHost` keeps users, packages, units, files and firewall state in
//! memory and interprets the subprocess calls the steps make. Every command
//! line is recorded in order.

use anyhow::{Result, anyhow, bail};
use converge::{CommandOutput, ExecuteError, ExecuteOptions, Host, Plan, RunSummary};
use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::resource::firewall::{UFW_DEFAULTS, policy_value};
use crate::resource::vars::upsert_var;

/// Execute a plan silently with default options
pub fn run_plan(plan: &Plan, host: &FakeHost) -> Result<RunSummary, ExecuteError> {
    converge::execute_simple(plan, host, &ExecuteOptions::default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFile {
    pub bytes: Vec<u8>,
    pub mode: u32,
}

#[derive(Debug, Default)]
pub struct UfwState {
    pub rules: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub uid: u32,
    pub user: String,
    pub users: BTreeSet<String>,
    pub packages: BTreeSet<String>,
    pub services: BTreeSet<String>,
    pub binaries: BTreeSet<String>,
    pub files: BTreeMap<PathBuf, FakeFile>,
    pub dirs: BTreeSet<PathBuf>,
    pub owners: BTreeMap<PathBuf, String>,
    /// Users with a usable password
    pub passwords: BTreeSet<String>,
    pub ufw: UfwState,
    /// Every command line run, interactive or not
    pub commands: Vec<String>,
    /// Command-line prefixes that exit non-zero
    pub failing: Vec<String>,
    pub offline: bool,
    pub reject_sudoers: bool,
    /// Device -> marker directory that appears when it is mounted
    pub devices: BTreeMap<String, String>,
    /// Directory archinstall leaves behind on success
    pub archinstall_creates: Option<PathBuf>,
    /// Helper installed by a successful `makepkg -si`
    pub makepkg_installs: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: RefCell<FakeState>,
}

impl FakeHost {
    /// A host where the effective identity is root
    pub fn root() -> Self {
        Self::as_user(0, "root")
    }

    /// A host where the effective identity is `name`
    pub fn user(name: &str) -> Self {
        Self::as_user(1000, name)
    }

    fn as_user(uid: u32, name: &str) -> Self {
        let host = Self::default();
        {
            let mut state = host.state.borrow_mut();
            state.uid = uid;
            state.user = name.to_string();
            state.users.insert("root".to_string());
            state.users.insert(name.to_string());
            state.dirs.insert(PathBuf::from("/"));
        }
        host
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    pub fn with_user(self, name: &str) -> Self {
        self.state.borrow_mut().users.insert(name.to_string());
        self
    }

    pub fn with_package(self, name: &str) -> Self {
        self.state.borrow_mut().packages.insert(name.to_string());
        self
    }

    pub fn with_service(self, unit: &str) -> Self {
        self.state.borrow_mut().services.insert(unit.to_string());
        self
    }

    pub fn with_binaries(self, names: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .binaries
            .extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.put(Path::new(path), contents.as_bytes().to_vec(), 0o644);
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.add_dir(Path::new(path));
        self
    }

    /// Make every command line starting with `prefix` exit non-zero
    pub fn failing(self, prefix: &str) -> Self {
        self.state.borrow_mut().failing.push(prefix.to_string());
        self
    }

    pub fn offline(self) -> Self {
        self.state.borrow_mut().offline = true;
        self
    }

    pub fn rejecting_sudoers(self) -> Self {
        self.state.borrow_mut().reject_sudoers = true;
        self
    }

    pub fn with_device(self, device: &str, marker: &str) -> Self {
        self.state
            .borrow_mut()
            .devices
            .insert(device.to_string(), marker.to_string());
        self
    }

    pub fn archinstall_creates(self, dir: &str) -> Self {
        self.state.borrow_mut().archinstall_creates = Some(PathBuf::from(dir));
        self
    }

    pub fn makepkg_installs(self, helper: &str) -> Self {
        self.state.borrow_mut().makepkg_installs = Some(helper.to_string());
        self
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn state(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// Whether any recorded command line starts with `prefix`
    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    /// Number of recorded command lines starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state
            .borrow()
            .files
            .get(Path::new(path))
            .map(|f| String::from_utf8_lossy(&f.bytes).into_owned())
    }

    pub fn file_mode(&self, path: &str) -> Option<u32> {
        self.state.borrow().files.get(Path::new(path)).map(|f| f.mode)
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.state.borrow().files.keys().cloned().collect()
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.state.borrow().packages.contains(name)
    }

    pub fn has_service(&self, unit: &str) -> bool {
        self.state.borrow().services.contains(unit)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn put(&self, path: &Path, bytes: Vec<u8>, mode: u32) {
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.state
            .borrow_mut()
            .files
            .insert(path.to_path_buf(), FakeFile { bytes, mode });
    }

    fn add_dir(&self, path: &Path) {
        let mut state = self.state.borrow_mut();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                state.dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    fn record(&self, program: &str, args: &[&str]) -> bool {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let mut state = self.state.borrow_mut();
        let fails = state.failing.iter().any(|p| line.starts_with(p.as_str()));
        state.commands.push(line);
        !fails
    }

    fn install(&self, args: &[&str]) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        for name in args.iter().filter(|a| !a.starts_with('-')) {
            state.packages.insert((*name).to_string());
        }
        CommandOutput::ok("")
    }

    fn dispatch(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = match (program, args) {
            ("sudo", [inner, rest @ ..]) => return self.dispatch(inner, rest),
            ("id", ["-u", name]) => {
                if self.state.borrow().users.contains(*name) {
                    CommandOutput::ok("1000\n")
                } else {
                    CommandOutput::failed(format!("id: '{name}': no such user"))
                }
            }
            ("id", ["-un"]) => CommandOutput::ok(format!("{}\n", self.state.borrow().user)),
            ("pacman" | "yay" | "paru", ["-Q", name]) => {
                if self.state.borrow().packages.contains(*name) {
                    CommandOutput::ok(format!("{name} 1.0-1\n"))
                } else {
                    CommandOutput::failed(format!("error: package '{name}' was not found"))
                }
            }
            ("pacman" | "yay" | "paru", [flag, rest @ ..]) if flag.starts_with("-S") => {
                if *flag == "-Sc" {
                    CommandOutput::ok("")
                } else {
                    self.install(rest)
                }
            }
            ("systemctl", ["is-enabled", "--quiet", unit]) => {
                if self.state.borrow().services.contains(*unit) {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed("")
                }
            }
            ("systemctl", ["enable", unit]) => {
                self.state.borrow_mut().services.insert((*unit).to_string());
                CommandOutput::ok("")
            }
            ("useradd", [.., name]) => {
                self.state.borrow_mut().users.insert((*name).to_string());
                self.add_dir(&Path::new("/home").join(name));
                CommandOutput::ok("")
            }
            ("passwd", ["-S", name]) => {
                let state = self.state.borrow();
                if !state.users.contains(*name) {
                    return Ok(CommandOutput::failed(format!(
                        "passwd: user '{name}' does not exist"
                    )));
                }
                let status = if state.passwords.contains(*name) {
                    "P"
                } else {
                    "L"
                };
                CommandOutput::ok(format!("{name} {status} 2026-10-18 0 99999 7 -1\n"))
            }
            ("passwd", [name]) => {
                self.state.borrow_mut().passwords.insert((*name).to_string());
                CommandOutput::ok("passwd: password updated successfully\n")
            }
            ("stat", ["-c", "%U", path]) => {
                let owner = self.state.borrow().owners.get(Path::new(path)).cloned();
                CommandOutput::ok(format!("{}\n", owner.as_deref().unwrap_or("root")))
            }
            ("visudo", ["-cf", path]) => {
                let present = self.state.borrow().files.contains_key(Path::new(path));
                if !present {
                    CommandOutput::failed(format!("visudo: unable to open {path}"))
                } else if self.state.borrow().reject_sudoers {
                    CommandOutput::failed(format!("{path}: syntax error near line 1"))
                } else {
                    CommandOutput::ok(format!("{path}: parsed OK\n"))
                }
            }
            ("ufw", args) => return self.ufw(args),
            ("ping", _) => {
                if self.state.borrow().offline {
                    CommandOutput::failed("ping: unknown host")
                } else {
                    CommandOutput::ok("1 packets transmitted, 1 received\n")
                }
            }
            ("mount", [device, mountpoint]) => {
                let marker = self.state.borrow().devices.get(*device).cloned();
                match marker {
                    Some(marker) => {
                        self.add_dir(&Path::new(mountpoint).join(marker));
                        CommandOutput::ok("")
                    }
                    None => CommandOutput::failed(format!(
                        "mount: {mountpoint}: special device {device} does not exist."
                    )),
                }
            }
            ("chown", [owner, path]) => {
                let user = owner.split(':').next().unwrap_or(owner);
                self.state
                    .borrow_mut()
                    .owners
                    .insert(PathBuf::from(path), user.to_string());
                CommandOutput::ok("")
            }
            ("git", ["clone", _, dir]) => {
                self.add_dir(Path::new(dir));
                CommandOutput::ok("")
            }
            _ => CommandOutput::ok(""),
        };
        Ok(output)
    }

    fn ufw(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = match args {
            ["status", ..] => {
                let status = if self.state.borrow().ufw.active {
                    "active"
                } else {
                    "inactive"
                };
                CommandOutput::ok(format!("Status: {status}\n"))
            }
            ["default", policy, direction] => {
                let key = match *direction {
                    "incoming" => "DEFAULT_INPUT_POLICY",
                    "outgoing" => "DEFAULT_OUTPUT_POLICY",
                    _ => return Ok(CommandOutput::failed("ERROR: Invalid direction")),
                };
                let path = Path::new(UFW_DEFAULTS);
                let current = self.read_file(path)?.unwrap_or_default();
                let patched = upsert_var(&current, key, policy_value(policy))?;
                self.put(path, patched.into_bytes(), 0o644);
                CommandOutput::ok("Default policy changed\n")
            }
            ["show", "added"] => {
                let mut out =
                    String::from("Added user rules (see 'ufw status' for running firewall):\n");
                for rule in &self.state.borrow().ufw.rules {
                    out.push_str(&format!("ufw allow {rule}\n"));
                }
                CommandOutput::ok(out)
            }
            ["allow", rule] => {
                let mut state = self.state.borrow_mut();
                if !state.ufw.rules.iter().any(|r| r == rule) {
                    state.ufw.rules.push((*rule).to_string());
                }
                CommandOutput::ok("Rules updated\n")
            }
            ["--force", "enable"] => {
                self.state.borrow_mut().ufw.active = true;
                CommandOutput::ok("Firewall is active and enabled on system startup\n")
            }
            _ => CommandOutput::ok(""),
        };
        Ok(output)
    }
}

impl Host for FakeHost {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        if !self.record(program, args) {
            return Ok(CommandOutput::failed(format!("{program}: simulated failure")));
        }
        self.dispatch(program, args)
    }

    fn run_interactive(&self, program: &str, args: &[&str], _cwd: Option<&Path>) -> Result<bool> {
        if !self.record(program, args) {
            return Ok(false);
        }
        match program {
            "archinstall" => {
                let created = self.state.borrow().archinstall_creates.clone();
                if let Some(dir) = created {
                    self.add_dir(&dir);
                }
            }
            "makepkg" => {
                let helper = self.state.borrow().makepkg_installs.clone();
                if let Some(helper) = helper {
                    let mut state = self.state.borrow_mut();
                    state.binaries.insert(helper.clone());
                    state.packages.insert(helper);
                }
            }
            _ => return Ok(self.dispatch(program, args)?.success),
        }
        Ok(true)
    }

    fn command_exists(&self, program: &str) -> bool {
        self.state.borrow().binaries.contains(program)
    }

    fn effective_uid(&self) -> u32 {
        self.state.borrow().uid
    }

    fn effective_user(&self) -> Result<String> {
        Ok(self.state.borrow().user.clone())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.borrow();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.state.borrow().dirs.contains(path)
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        Ok(self
            .state
            .borrow()
            .files
            .get(path)
            .map(|f| String::from_utf8_lossy(&f.bytes).into_owned()))
    }

    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.state.borrow().files.get(path).map(|f| f.bytes.clone()))
    }

    fn mode(&self, path: &Path) -> Result<Option<u32>> {
        let state = self.state.borrow();
        if let Some(file) = state.files.get(path) {
            return Ok(Some(file.mode));
        }
        Ok(state.dirs.contains(path).then_some(0o755))
    }

    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        self.put(path, contents.as_bytes().to_vec(), mode);
        Ok(())
    }

    fn append_file(&self, path: &Path, contents: &str) -> Result<()> {
        let existing = self.state.borrow().files.get(path).cloned();
        let (mut bytes, mode) = existing.map_or((Vec::new(), 0o644), |f| (f.bytes, f.mode));
        bytes.extend_from_slice(contents.as_bytes());
        self.put(path, bytes, mode);
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path, mode: u32) -> Result<()> {
        let bytes = self
            .read_bytes(from)?
            .ok_or_else(|| anyhow!("{}: No such file or directory", from.display()))?;
        self.put(to, bytes, mode);
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        match self.state.borrow_mut().files.get_mut(path) {
            Some(file) => {
                file.mode = mode;
                Ok(())
            }
            None => bail!("{}: No such file or directory", path.display()),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let file = self
            .state
            .borrow_mut()
            .files
            .remove(from)
            .ok_or_else(|| anyhow!("{}: No such file or directory", from.display()))?;
        self.put(to, file.bytes, file.mode);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.state.borrow_mut().files.remove(path);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }
}
