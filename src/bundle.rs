use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::StoreError;
use crate::presets::{Preset, PresetStore};

const MANIFEST_ENTRY: &str = "manifest.json";
const PRESETS_ENTRY: &str = "presets.json";
pub const BUNDLE_FORMAT_V1: &str = "campus-presets-v1";

pub type PresetsByNamespace = BTreeMap<String, Vec<Preset>>;

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub namespace_count: usize,
    pub preset_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Incoming presets replace same-named ones; others are appended.
    Upsert,
    /// Each incoming namespace is replaced wholesale.
    Replace,
}

impl MergePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upsert" => Some(Self::Upsert),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub namespaces: usize,
    pub inserted: usize,
    pub replaced: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn export_presets_bundle(
    presets: &PresetsByNamespace,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let payload = serde_json::to_vec_pretty(presets).context("failed to serialize presets")?;
    let preset_count: usize = presets.values().map(Vec::len).sum();

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "namespaces": presets.keys().collect::<Vec<_>>(),
        "presetCount": preset_count,
        "sha256": sha256_hex(&payload),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(PRESETS_ENTRY, opts)
        .context("failed to start presets entry")?;
    zip.write_all(&payload)
        .context("failed to write presets entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        namespace_count: presets.len(),
        preset_count,
    })
}

pub fn read_presets_bundle(in_path: &Path) -> anyhow::Result<PresetsByNamespace> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest.json missing sha256"))?
        .to_string();

    let mut payload = Vec::new();
    archive
        .by_name(PRESETS_ENTRY)
        .context("bundle missing presets.json")?
        .read_to_end(&mut payload)
        .context("failed to read presets.json")?;

    let actual = sha256_hex(&payload);
    if actual != expected {
        return Err(anyhow!(
            "presets.json checksum mismatch (expected {}, got {})",
            expected,
            actual
        ));
    }

    serde_json::from_slice(&payload).context("presets.json is invalid")
}

/// Writes `incoming` into `store`, one whole-namespace write per namespace.
pub fn merge_presets(
    store: &mut impl PresetStore,
    incoming: &PresetsByNamespace,
    policy: MergePolicy,
) -> Result<MergeSummary, StoreError> {
    let mut summary = MergeSummary::default();
    for (namespace, presets) in incoming {
        let mut next = match policy {
            MergePolicy::Upsert => store.load(namespace)?,
            MergePolicy::Replace => Vec::new(),
        };
        for p in presets {
            if p.name.trim().is_empty() {
                continue;
            }
            match next.iter_mut().find(|existing| existing.name == p.name) {
                Some(existing) => {
                    *existing = p.clone();
                    summary.replaced += 1;
                }
                None => {
                    next.push(p.clone());
                    summary.inserted += 1;
                }
            }
        }
        store.save(namespace, &next)?;
        summary.namespaces += 1;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::MemoryPresetStore;

    fn preset(name: &str, class_id: &str) -> Preset {
        Preset {
            name: name.to_string(),
            filters: [("class_id".to_string(), class_id.to_string())]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn upsert_merge_keeps_local_order() {
        let mut store = MemoryPresetStore::new();
        store
            .save("examFilterPresets", &[preset("a", "1"), preset("b", "2")])
            .expect("seed");
        let mut incoming = PresetsByNamespace::new();
        incoming.insert(
            "examFilterPresets".into(),
            vec![preset("b", "20"), preset("c", "3"), preset(" ", "x")],
        );

        let summary = merge_presets(&mut store, &incoming, MergePolicy::Upsert).expect("merge");
        assert_eq!(
            summary,
            MergeSummary {
                namespaces: 1,
                inserted: 1,
                replaced: 1
            }
        );
        let loaded = store.load("examFilterPresets").expect("load");
        assert_eq!(loaded, vec![preset("a", "1"), preset("b", "20"), preset("c", "3")]);
    }

    #[test]
    fn replace_merge_drops_local_presets() {
        let mut store = MemoryPresetStore::new();
        store
            .save("classFilterPresets", &[preset("a", "1")])
            .expect("seed");
        let mut incoming = PresetsByNamespace::new();
        incoming.insert("classFilterPresets".into(), vec![preset("z", "9")]);
        merge_presets(&mut store, &incoming, MergePolicy::Replace).expect("merge");
        assert_eq!(
            store.load("classFilterPresets").expect("load"),
            vec![preset("z", "9")]
        );
    }

    #[test]
    fn checksum_is_lowercase_hex() {
        let h = sha256_hex(b"");
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
