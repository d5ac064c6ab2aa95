//! Job type to script mapping.
//!
//! Each [`JobType`] resolves to exactly one [`ScriptDescriptor`]. The match in
//! [`ScriptCatalog::descriptor`] is exhaustive, so adding a job type without a
//! script fails to compile.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::job::JobType;

use super::executor::{ArgEncoding, ScriptDescriptor};

/// Script file that enumerates the contents of a geodatabase.
pub const LIST_FEATURE_CLASSES_SCRIPT: &str = "list_feature_classes.py";

/// Resolves job types to the scripts that implement them.
#[derive(Debug, Clone)]
pub struct ScriptCatalog {
    scripts_dir: PathBuf,
    python_bin: String,
    overrides: HashMap<JobType, ScriptDescriptor>,
    enumeration_override: Option<ScriptDescriptor>,
}

impl ScriptCatalog {
    /// Catalog of Python scripts under `scripts_dir`, run with `python_bin`.
    pub fn new(scripts_dir: impl Into<PathBuf>, python_bin: impl Into<String>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            python_bin: python_bin.into(),
            overrides: HashMap::new(),
            enumeration_override: None,
        }
    }

    /// Replace the script used for one job type.
    pub fn with_descriptor(mut self, job_type: JobType, descriptor: ScriptDescriptor) -> Self {
        self.overrides.insert(job_type, descriptor);
        self
    }

    /// Replace the feature-class enumeration script.
    pub fn with_enumeration_descriptor(mut self, descriptor: ScriptDescriptor) -> Self {
        self.enumeration_override = Some(descriptor);
        self
    }

    /// File name of the bundled script for a job type.
    pub fn script_file(job_type: JobType) -> &'static str {
        match job_type {
            JobType::Extraction => "gdb_extraction.py",
            JobType::Migration => "sde_conversion.py",
            JobType::Comparison => "comparison.py",
        }
    }

    /// Launch descriptor for a job type.
    pub fn descriptor(&self, job_type: JobType) -> ScriptDescriptor {
        if let Some(descriptor) = self.overrides.get(&job_type) {
            return descriptor.clone();
        }
        ScriptDescriptor::interpreted(
            self.python_bin.clone(),
            self.scripts_dir.join(Self::script_file(job_type)),
            ArgEncoding::Argument,
        )
    }

    /// Launch descriptor for the feature-class enumeration script.
    pub fn enumeration_descriptor(&self) -> ScriptDescriptor {
        self.enumeration_override.clone().unwrap_or_else(|| {
            ScriptDescriptor::interpreted(
                self.python_bin.clone(),
                self.scripts_dir.join(LIST_FEATURE_CLASSES_SCRIPT),
                ArgEncoding::Argument,
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_job_type_maps_to_a_distinct_script() {
        let catalog = ScriptCatalog::new("/opt/geohub/scripts", "python3");
        let mut paths: Vec<_> = JobType::ALL
            .iter()
            .map(|t| catalog.descriptor(*t).script_path)
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), JobType::ALL.len());
    }

    #[test]
    fn default_descriptor_uses_python_and_argument_encoding() {
        let catalog = ScriptCatalog::new("/opt/geohub/scripts", "/usr/bin/python3.11");
        let d = catalog.descriptor(JobType::Migration);
        assert_eq!(d.program.as_deref(), Some("/usr/bin/python3.11"));
        assert_eq!(d.script_path, PathBuf::from("/opt/geohub/scripts/sde_conversion.py"));
        assert_eq!(d.encoding, ArgEncoding::Argument);
    }

    #[test]
    fn override_replaces_single_type() {
        let custom = ScriptDescriptor::executable("/usr/local/bin/compare", ArgEncoding::Stdin);
        let catalog = ScriptCatalog::new("/s", "python3")
            .with_descriptor(JobType::Comparison, custom.clone());
        assert_eq!(catalog.descriptor(JobType::Comparison), custom);
        assert_eq!(
            catalog.descriptor(JobType::Extraction).script_path,
            PathBuf::from("/s/gdb_extraction.py")
        );
    }

    #[test]
    fn enumeration_script_defaults_to_bundled_file() {
        let catalog = ScriptCatalog::new("/s", "python3");
        assert_eq!(
            catalog.enumeration_descriptor().script_path,
            PathBuf::from("/s/list_feature_classes.py")
        );
    }
}
