// A patch is everything the host needs to play something: sequencer settings,
// the voices it triggers and the effect chain they run through.
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::effect::{ChorusConfig, DriveConfig, EffectSpec};
use crate::sequencer::{SequencerConfig, Subdivision};
use crate::voice::VoiceSpec;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patch {
    pub sequencer: SequencerConfig,
    pub voices: Vec<VoiceSpec>,
    pub chain: Vec<EffectSpec>,
    /// How long the host plays before exiting.
    pub seconds: f64,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            sequencer: SequencerConfig::default(),
            voices: vec![
                VoiceSpec {
                    subdivision: Subdivision::Whole,
                    frequency: 110.0,
                    level: 0.6,
                    decay: 0.4,
                    ..Default::default()
                },
                VoiceSpec {
                    subdivision: Subdivision::Quarter,
                    frequency: 220.0,
                    level: 0.4,
                    ..Default::default()
                },
                VoiceSpec {
                    subdivision: Subdivision::Sixteenth,
                    frequency: 1760.0,
                    level: 0.08,
                    decay: 0.04,
                    ..Default::default()
                },
            ],
            chain: vec![
                EffectSpec::Chorus(ChorusConfig::default()),
                EffectSpec::Drive(DriveConfig::default()),
            ],
            seconds: 8.0,
        }
    }
}

pub fn load_patch(path: &Path) -> anyhow::Result<Patch> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading patch {}", path.display()))?;
    let patch = serde_json::from_str(&data)
        .with_context(|| format!("parsing patch {}", path.display()))?;
    Ok(patch)
}

// Save the patch, creating parent directories if they don't exist already
pub fn save_patch(path: &Path, patch: &Patch) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(patch)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::NoteResolution;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patches").join("default.json");
        let patch = Patch::default();
        save_patch(&path, &patch).unwrap();
        assert_eq!(load_patch(&path).unwrap(), patch);
    }

    #[test]
    fn sparse_file_fills_in_defaults() {
        let patch: Patch = serde_json::from_str(
            r#"{
                "sequencer": { "tempo": 90, "resolution": "eighth", "bars": 2 },
                "chain": [ { "type": "flanger", "feedback": 0.7 } ]
            }"#,
        )
        .unwrap();
        assert_eq!(patch.sequencer.tempo, 90.0);
        assert_eq!(patch.sequencer.resolution, NoteResolution::Eighth);
        assert!(patch.sequencer.multitrack);
        assert_eq!(patch.chain.len(), 1);
        assert_eq!(patch.chain[0].label(), "Flanger(0.25 Hz, fb 0.7)");
        assert_eq!(patch.voices, Patch::default().voices);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_patch(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn unknown_subdivision_is_refused() {
        let r: Result<Patch, _> =
            serde_json::from_str(r#"{ "voices": [ { "subdivision": "thirtysecond" } ] }"#);
        assert!(r.is_err());
    }
}
