//! Boot-loader theming: upsert settings into the GRUB defaults file and
//! regenerate `grub.cfg` when anything changed
//!
//! The defaults file only keeps the new settings once `grub-mkconfig` has
//! succeeded, so a failed regeneration is retried on the next run.

use anyhow::{Result, bail};
use std::path::PathBuf;

use super::vars::{read_var, upsert_var};
use super::{ApplyContext, ApplyResult, Host, Step, StepState};

#[derive(Debug, Clone)]
pub struct GrubSettings {
    pub file: PathBuf,
    pub output: String,
    pub settings: Vec<(String, String)>,
}

impl GrubSettings {
    pub fn new(
        file: impl Into<PathBuf>,
        output: &str,
        settings: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            file: file.into(),
            output: output.to_string(),
            settings: settings.into_iter().collect(),
        }
    }

    fn patch(&self, content: &str) -> Result<String> {
        let mut patched = content.to_string();
        for (key, value) in &self.settings {
            patched = upsert_var(&patched, key, value)?;
        }
        Ok(patched)
    }

    fn current(&self, host: &dyn Host) -> Result<String> {
        match host.read_file(&self.file)? {
            Some(content) => Ok(content),
            None => bail!("{} not found (is grub installed?)", self.file.display()),
        }
    }
}

impl Step for GrubSettings {
    fn id(&self) -> String {
        format!("grub:{}", self.file.display())
    }

    fn description(&self) -> String {
        let keys: Vec<&str> = self.settings.iter().map(|(k, _)| k.as_str()).collect();
        format!("Configure GRUB ({})", keys.join(", "))
    }

    fn kind(&self) -> &'static str {
        "grub"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let content = self.current(host)?;
        let differing: Vec<&str> = self
            .settings
            .iter()
            .filter(|(key, value)| read_var(&content, key).as_deref() != Some(value.as_str()))
            .map(|(key, _)| key.as_str())
            .collect();

        if differing.is_empty() {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::drifted(differing.join(", ")))
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let content = self.current(ctx.host)?;
        let patched = self.patch(&content)?;
        if patched == content {
            return Ok(ApplyResult::NoChange);
        }

        let mode = ctx.host.mode(&self.file)?.unwrap_or(0o644);
        ctx.host.write_file(&self.file, &patched, mode)?;
        if let Err(err) = ctx.host.run_checked("grub-mkconfig", &["-o", &self.output]) {
            ctx.host.write_file(&self.file, &content, mode)?;
            return Err(err);
        }
        Ok(ApplyResult::Modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, run_plan};
    use converge::Plan;

    const DEFAULTS: &str = "GRUB_DEFAULT=0\nGRUB_TIMEOUT=5\n#GRUB_THEME=\"/path/to/gfxtheme\"\n";

    fn plan() -> Plan {
        let settings = [
            ("GRUB_THEME", "/usr/share/grub/themes/archup/theme.txt"),
            ("GRUB_GFXMODE", "1920x1080"),
            ("GRUB_TIMEOUT", "5"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));

        let mut plan = Plan::new();
        plan.push(Box::new(GrubSettings::new(
            "/etc/default/grub",
            "/boot/grub/grub.cfg",
            settings,
        )));
        plan
    }

    #[test]
    fn test_patches_and_regenerates_once() {
        let host = FakeHost::root().with_file("/etc/default/grub", DEFAULTS);

        run_plan(&plan(), &host).unwrap();
        let grub = host.file("/etc/default/grub").unwrap();
        assert_eq!(
            grub,
            "GRUB_DEFAULT=0\nGRUB_TIMEOUT=\"5\"\nGRUB_THEME=\"/usr/share/grub/themes/archup/theme.txt\"\nGRUB_GFXMODE=\"1920x1080\"\n"
        );
        assert_eq!(host.count("grub-mkconfig -o /boot/grub/grub.cfg"), 1);

        let second = run_plan(&plan(), &host).unwrap();
        assert_eq!(second.already_done(), 1);
        assert_eq!(host.count("grub-mkconfig"), 1);
    }

    #[test]
    fn test_missing_defaults_file_is_soft_failure() {
        let host = FakeHost::root();
        let summary = run_plan(&plan(), &host).unwrap();
        assert_eq!(summary.failed_ids(), vec!["grub:/etc/default/grub"]);
        assert!(!host.ran("grub-mkconfig"));
    }

    #[test]
    fn test_mkconfig_failure_is_soft() {
        let host = FakeHost::root()
            .with_file("/etc/default/grub", DEFAULTS)
            .failing("grub-mkconfig");
        let summary = run_plan(&plan(), &host).unwrap();
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn test_rerun_after_failed_mkconfig_regenerates() {
        let host = FakeHost::root()
            .with_file("/etc/default/grub", DEFAULTS)
            .failing("grub-mkconfig");

        run_plan(&plan(), &host).unwrap();
        assert_eq!(host.file("/etc/default/grub").unwrap(), DEFAULTS);

        let rerun = run_plan(&plan(), &host).unwrap();
        assert_eq!(rerun.already_done(), 0);
        assert_eq!(host.count("grub-mkconfig -o /boot/grub/grub.cfg"), 2);
    }
}
