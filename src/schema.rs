use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::paths;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The archup configuration (`archup.toml`)
///
/// Every section falls back to its defaults, so an empty file is a valid
/// config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// systemd units enabled by the post-install stage
    pub services: Vec<String>,

    /// Installer stage: archinstall invocation and target discovery
    pub install: InstallConfig,

    /// Network reachability probe
    pub network: NetworkConfig,

    /// The primary (non-administrative) user
    pub user: UserConfig,

    /// Official repository packages installed by the post-install stage
    pub packages: PackageGroups,

    pub firewall: FirewallConfig,

    pub network_manager: FileConfig,

    /// CIFS share mount, skipped when absent
    pub share: Option<ShareConfig>,

    pub grub: GrubConfig,

    pub greeter: GreeterConfig,

    /// AUR helper and AUR packages for the extras stage
    pub aur: AurConfig,
}

// ============================================================================
// Installer Stage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// archinstall configuration file, passed through untouched
    pub config: String,
    /// Optional archinstall credentials file
    pub creds: Option<String>,
    /// Extra arguments for archinstall
    pub extra_args: Vec<String>,
    /// Mount points checked for the new root, in priority order
    pub candidates: Vec<String>,
    /// Directory that must exist under a candidate for it to count as the new root
    pub marker: String,
    /// Explicit mount attempted when no candidate matches
    pub fallback: FallbackMount,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            config: "/root/archinstall/user_configuration.json".to_string(),
            creds: None,
            extra_args: vec!["--silent".to_string()],
            candidates: vec!["/mnt/archinstall".to_string(), "/mnt".to_string()],
            marker: "etc".to_string(),
            fallback: FallbackMount::default(),
        }
    }
}

impl InstallConfig {
    pub fn config_path(&self) -> PathBuf {
        paths::expand(&self.config)
    }

    pub fn creds_path(&self) -> Option<PathBuf> {
        self.creds.as_deref().map(paths::expand)
    }

    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| paths::expand(c)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackMount {
    /// Block device holding the new root (e.g. `/dev/nvme0n1p2`); empty
    /// disables the fallback
    pub device: String,
    pub mountpoint: String,
}

impl Default for FallbackMount {
    /// Root partition of archinstall's default layout on the first SATA disk
    fn default() -> Self {
        Self {
            device: "/dev/sda2".to_string(),
            mountpoint: "/mnt".to_string(),
        }
    }
}

impl FallbackMount {
    pub fn is_enabled(&self) -> bool {
        !self.device.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host pinged to prove network reachability
    pub probe_host: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_host: "archlinux.org".to_string(),
        }
    }
}

// ============================================================================
// Post-Install Stage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub name: String,
    pub groups: Vec<String>,
    pub shell: String,
    /// Line written to the sudoers drop-in
    pub sudoers_rule: String,
    /// Prompt for the new user's password right after creation
    pub set_password: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: "arch".to_string(),
            groups: ["wheel", "audio", "video", "storage", "network"]
                .map(String::from)
                .to_vec(),
            shell: "/bin/bash".to_string(),
            sudoers_rule: "%wheel ALL=(ALL:ALL) ALL".to_string(),
            set_password: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageGroups {
    /// Installed without asking
    pub required: Vec<String>,
    /// Installed only after the operator agrees
    pub optional: Vec<String>,
}

impl Default for PackageGroups {
    fn default() -> Self {
        Self {
            required: [
                "base-devel",
                "git",
                "sudo",
                "networkmanager",
                "ufw",
                "cifs-utils",
                "grub",
                "sddm",
                "bluez",
                "bluez-utils",
                "pipewire",
                "pipewire-pulse",
                "openssh",
            ]
            .map(String::from)
            .to_vec(),
            optional: ["firefox", "vlc", "htop", "fastfetch", "noto-fonts-emoji"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub default_incoming: String,
    pub default_outgoing: String,
    /// Arguments for `ufw allow` (e.g. "ssh", "1714:1764/tcp")
    pub allow: Vec<String>,
}

impl FirewallConfig {
    /// Policy names `ufw default` accepts
    pub const POLICIES: &'static [&'static str] = &["allow", "deny", "reject"];
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            default_incoming: "deny".to_string(),
            default_outgoing: "allow".to_string(),
            allow: vec!["ssh".to_string()],
        }
    }
}

/// A managed configuration file with fixed contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: String,
    pub contents: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: "/etc/NetworkManager/conf.d/archup.conf".to_string(),
            contents: "[connection]\nwifi.powersave = 2\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// CIFS share (e.g. `//nas.local/media`)
    pub remote: String,
    pub mountpoint: String,
    /// Credentials file, created as an empty template
    #[serde(default = "default_share_credentials")]
    pub credentials: String,
    #[serde(default = "default_share_options")]
    pub options: String,
}

fn default_share_credentials() -> String {
    "/etc/samba/credentials/archup".to_string()
}

fn default_share_options() -> String {
    "uid=1000,gid=1000,iocharset=utf8,_netdev,nofail,x-systemd.automount".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrubConfig {
    /// GRUB defaults file patched in place
    pub file: String,
    /// Where `grub-mkconfig` writes after a change
    pub output: String,
    /// Settings upserted into `file`
    pub settings: BTreeMap<String, String>,
}

impl Default for GrubConfig {
    fn default() -> Self {
        let settings = [
            ("GRUB_THEME", "/usr/share/grub/themes/archup/theme.txt"),
            ("GRUB_GFXMODE", "1920x1080"),
            ("GRUB_TIMEOUT", "5"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            file: "/etc/default/grub".to_string(),
            output: "/boot/grub/grub.cfg".to_string(),
            settings,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreeterConfig {
    pub package: String,
    pub service: String,
    pub path: String,
    pub contents: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            package: "sddm".to_string(),
            service: "sddm".to_string(),
            path: "/etc/sddm.conf.d/10-archup.conf".to_string(),
            contents: "[Theme]\nCurrent=breeze\n\n[Users]\nMinimumUid=1000\n".to_string(),
        }
    }
}

// ============================================================================
// Extras Stage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AurConfig {
    /// Helper binary name, also the AUR package built from `repo`
    pub helper: String,
    pub repo: String,
    /// Checkout directory for the helper build
    pub build_dir: String,
    /// Official packages the helper build needs
    pub prerequisites: Vec<String>,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    /// Clear the helper's package cache at the end
    pub clean_cache: bool,
}

impl Default for AurConfig {
    fn default() -> Self {
        Self {
            helper: "yay".to_string(),
            repo: "https://aur.archlinux.org/yay-bin.git".to_string(),
            build_dir: "~/.cache/archup/yay-bin".to_string(),
            prerequisites: vec!["base-devel".to_string(), "git".to_string()],
            required: vec!["visual-studio-code-bin".to_string()],
            optional: vec!["spotify".to_string(), "google-chrome".to_string()],
            clean_cache: true,
        }
    }
}

impl AurConfig {
    pub fn build_path(&self) -> PathBuf {
        paths::expand(&self.build_dir)
    }
}

// ============================================================================
// Defaults & Validation
// ============================================================================

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            services: ["NetworkManager", "ufw", "bluetooth", "sshd"]
                .map(String::from)
                .to_vec(),
            install: InstallConfig::default(),
            network: NetworkConfig::default(),
            user: UserConfig::default(),
            packages: PackageGroups::default(),
            firewall: FirewallConfig::default(),
            network_manager: FileConfig::default(),
            share: None,
            grub: GrubConfig::default(),
            greeter: GreeterConfig::default(),
            aur: AurConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// The configuration used when no file exists
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Check the config for values that would make a stage misbehave
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let user_re = Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$")?;
        if !user_re.is_match(&self.user.name) {
            problems.push(format!("invalid user name '{}'", self.user.name));
        }
        if self.user.name == "root" {
            problems.push("the provisioned user cannot be root".to_string());
        }

        let all_packages = self
            .packages
            .required
            .iter()
            .chain(&self.packages.optional)
            .chain(&self.aur.prerequisites)
            .chain(&self.aur.required)
            .chain(&self.aur.optional)
            .chain(std::iter::once(&self.greeter.package));
        for name in all_packages {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                problems.push(format!("invalid package name '{name}'"));
            }
        }

        let policies = [
            ("firewall.default_incoming", &self.firewall.default_incoming),
            ("firewall.default_outgoing", &self.firewall.default_outgoing),
        ];
        for (key, policy) in policies {
            if !FirewallConfig::POLICIES.contains(&policy.as_str()) {
                problems.push(format!(
                    "{key} must be one of {} (got '{policy}')",
                    FirewallConfig::POLICIES.join(", ")
                ));
            }
        }

        if self.install.candidates.is_empty() {
            problems.push("install.candidates must list at least one mount point".to_string());
        }

        let mut absolute = vec![
            ("network_manager.path", self.network_manager.path.as_str()),
            ("grub.file", self.grub.file.as_str()),
            ("grub.output", self.grub.output.as_str()),
            ("greeter.path", self.greeter.path.as_str()),
            ("user.shell", self.user.shell.as_str()),
        ];
        if let Some(share) = &self.share {
            absolute.push(("share.mountpoint", share.mountpoint.as_str()));
            absolute.push(("share.credentials", share.credentials.as_str()));
            if !share.remote.starts_with("//") {
                problems.push(format!("share.remote '{}' must start with //", share.remote));
            }
        }
        for (key, value) in absolute {
            if !paths::expand(value).is_absolute() {
                problems.push(format!("{key} must be an absolute path (got '{value}')"));
            }
        }

        let key_re = Regex::new(r"^[A-Z_][A-Z0-9_]*$")?;
        for key in self.grub.settings.keys() {
            if !key_re.is_match(key) {
                problems.push(format!("grub setting '{key}' is not a valid variable name"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            bail!("invalid configuration:\n  - {}", problems.join("\n  - "))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
