use crate::driver::PageDriver;
use crate::{Error, Result};
use pagescope_core::config::GlobalProbeSet;
use pagescope_core::report::GlobalSnapshot;
use serde_json::{Map, Value};

/// A report field read from a path under `window`
struct Probe {
    key: &'static str,
    path: &'static [&'static str],
}

const USER: Probe = Probe {
    key: "user",
    path: &["user"],
};
const DATA_LAYER: Probe = Probe {
    key: "dataLayer",
    path: &["dataLayer"],
};
const ANALYTICS_META: Probe = Probe {
    key: "analyticsMeta",
    path: &["ShopifyAnalytics", "meta"],
};

const FULL_PROBES: &[Probe] = &[USER, DATA_LAYER, ANALYTICS_META];
const MINIMAL_PROBES: &[Probe] = &[DATA_LAYER];

const PROBE_PRELUDE: &str = r#"(() => {
  const plain = (value, ancestors) => {
    if (value === undefined || typeof value === 'function' || typeof value === 'symbol') return undefined;
    if (typeof value === 'bigint') return value.toString();
    if (value === null || typeof value !== 'object') return value;
    // only a reference back into the current path is a cycle
    if (ancestors.includes(value)) return undefined;
    if (typeof value.toJSON === 'function') {
      const json = value.toJSON();
      if (json !== value) return plain(json, ancestors);
    }
    ancestors.push(value);
    try {
      if (Array.isArray(value)) {
        return value.map((item) => {
          const copy = plain(item, ancestors);
          return copy === undefined ? null : copy;
        });
      }
      const copy = {};
      for (const key of Object.keys(value)) {
        let field;
        try {
          field = plain(value[key], ancestors);
        } catch (_) {
          field = undefined;
        }
        if (field !== undefined) copy[key] = field;
      }
      return copy;
    } finally {
      ancestors.pop();
    }
  };
  const read = (path) => {
    try {
      let node = window;
      for (const key of path) {
        if (node === undefined || node === null) return null;
        node = node[key];
      }
      return plain(node, []) ?? null;
    } catch (_) {
      return null;
    }
  };
  const snapshot = { title: document.title, location: window.location.href };
"#;

const PROBE_EPILOGUE: &str = r#"  return JSON.stringify(snapshot);
})()"#;

/// Reads well-known page globals once the page has settled
///
/// The probe is read-only and never throws: a missing global, a throwing
/// getter or a value that cannot be serialized all come back as `null`.
/// Objects shared between globals are copied at every place they appear;
/// only back-references into their own ancestry are cut.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalsExtractor {
    probes: GlobalProbeSet,
}

impl GlobalsExtractor {
    pub fn new(probes: GlobalProbeSet) -> Self {
        Self { probes }
    }

    fn probes(&self) -> &'static [Probe] {
        match self.probes {
            GlobalProbeSet::Full => FULL_PROBES,
            GlobalProbeSet::Minimal => MINIMAL_PROBES,
        }
    }

    /// The expression evaluated in the page; it returns the snapshot as a JSON string
    pub fn expression(&self) -> String {
        let mut script = String::from(PROBE_PRELUDE);
        for probe in self.probes() {
            // serde_json renders valid JS string literals
            let key = Value::from(probe.key);
            let path = Value::from(probe.path.to_vec());
            script.push_str(&format!("  snapshot[{}] = read({});\n", key, path));
        }
        script.push_str(PROBE_EPILOGUE);
        script
    }

    pub async fn extract(&self, page: &dyn PageDriver) -> Result<GlobalSnapshot> {
        let raw = page.evaluate(&self.expression()).await?;
        self.snapshot_from(raw)
    }

    /// Turn the probe's JSON string result into a snapshot
    pub fn snapshot_from(&self, raw: Value) -> Result<GlobalSnapshot> {
        let Value::String(text) = raw else {
            return Err(Error::Browser(format!(
                "Global probe returned {} instead of a string",
                raw
            )));
        };
        let mut fields: Map<String, Value> = serde_json::from_str(&text)
            .map_err(|e| Error::Browser(format!("Global probe returned invalid JSON: {}", e)))?;

        let mut probed = |key: &str| {
            self.probes()
                .iter()
                .any(|probe| probe.key == key)
                .then(|| fields.remove(key).unwrap_or(Value::Null))
        };
        let user = probed(USER.key);
        let data_layer = probed(DATA_LAYER.key);
        let analytics_meta = probed(ANALYTICS_META.key);

        Ok(GlobalSnapshot {
            title: string_field(&fields, "title"),
            location: string_field(&fields, "location"),
            user,
            data_layer,
            analytics_meta,
        })
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
