//! Value normalization
//!
//! A mapping turns a raw value from its domain into the `[0, 1]` output range
//! used for comparison and rendering.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::desc::{ColumnDesc, MappingDesc};
use crate::value::as_numbers;

/// Evaluator behind a scripted mapping
pub type ScriptFn = Arc<dyn Fn(f64, &ScriptContext) -> f64 + Send + Sync>;

/// Inputs available to a scripted mapping besides the value itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptContext {
    pub domain: [f64; 2],
    pub range: [f64; 2],
}

impl ScriptContext {
    /// The value linearly normalized into `[0, 1]` over the domain
    pub fn normalized(&self, v: f64) -> f64 {
        (v - self.domain[0]) / (self.domain[1] - self.domain[0])
    }
}

/// Normalization laws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    Linear,
    Sqrt,
    Pow11,
    Pow2,
    Pow3,
}

impl ScaleKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "linear" => Some(Self::Linear),
            "sqrt" => Some(Self::Sqrt),
            "pow1.1" => Some(Self::Pow11),
            "pow2" => Some(Self::Pow2),
            "pow3" => Some(Self::Pow3),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sqrt => "sqrt",
            Self::Pow11 => "pow1.1",
            Self::Pow2 => "pow2",
            Self::Pow3 => "pow3",
        }
    }

    fn exponent(self) -> f64 {
        match self {
            Self::Linear => 1.0,
            Self::Sqrt => 0.5,
            Self::Pow11 => 1.1,
            Self::Pow2 => 2.0,
            Self::Pow3 => 3.0,
        }
    }
}

/// A normalization function with its inverse
#[derive(Clone)]
pub enum MappingFunction {
    Scale {
        kind: ScaleKind,
        domain: [f64; 2],
        range: [f64; 2],
    },
    Script {
        code: String,
        domain: [f64; 2],
        range: [f64; 2],
        /// `None` when no evaluator is registered for `code`; behaves linearly then
        evaluator: Option<ScriptFn>,
    },
}

impl MappingFunction {
    pub fn linear(lo: f64, hi: f64) -> Self {
        Self::Scale {
            kind: ScaleKind::Linear,
            domain: [lo, hi],
            range: [0.0, 1.0],
        }
    }

    pub fn scale(kind: ScaleKind, domain: [f64; 2]) -> Self {
        Self::Scale {
            kind,
            domain,
            range: [0.0, 1.0],
        }
    }

    pub fn script(code: impl Into<String>, domain: [f64; 2], evaluator: Option<ScriptFn>) -> Self {
        Self::Script {
            code: code.into(),
            domain,
            range: [0.0, 1.0],
            evaluator,
        }
    }

    /// Build the mapping declared by a descriptor
    ///
    /// `scripts` resolves the source of a scripted mapping to its evaluator.
    pub fn from_desc(desc: &ColumnDesc, scripts: &dyn Fn(&str) -> Option<ScriptFn>) -> Self {
        match &desc.map {
            Some(map) => Self::from_mapping_desc(map, desc.domain, scripts),
            None => Self::Scale {
                kind: ScaleKind::Linear,
                domain: desc.domain.unwrap_or([f64::NAN, f64::NAN]),
                range: desc.range.unwrap_or([0.0, 1.0]),
            },
        }
    }

    /// Build a mapping from its serialized form
    pub fn from_mapping_desc(
        map: &MappingDesc,
        fallback_domain: Option<[f64; 2]>,
        scripts: &dyn Fn(&str) -> Option<ScriptFn>,
    ) -> Self {
        let domain = map
            .domain
            .or(fallback_domain)
            .unwrap_or([f64::NAN, f64::NAN]);
        let range = map.range.unwrap_or([0.0, 1.0]);
        if map.kind == "script" {
            let code = map.code.clone().unwrap_or_default();
            let evaluator = scripts(&code);
            if evaluator.is_none() {
                tracing::warn!(code = %code, "no evaluator registered for scripted mapping, using linear");
            }
            return Self::Script {
                code,
                domain,
                range,
                evaluator,
            };
        }
        let kind = ScaleKind::from_tag(&map.kind).unwrap_or_else(|| {
            tracing::warn!(kind = %map.kind, "unknown mapping type, using linear");
            ScaleKind::Linear
        });
        Self::Scale {
            kind,
            domain,
            range,
        }
    }

    /// Serialized form of this mapping
    pub fn to_desc(&self) -> MappingDesc {
        match self {
            Self::Scale {
                kind,
                domain,
                range,
            } => MappingDesc {
                kind: kind.tag().to_string(),
                domain: Some(*domain),
                range: Some(*range),
                code: None,
            },
            Self::Script {
                code,
                domain,
                range,
                ..
            } => MappingDesc {
                kind: "script".to_string(),
                domain: Some(*domain),
                range: Some(*range),
                code: Some(code.clone()),
            },
        }
    }

    pub fn domain(&self) -> [f64; 2] {
        match self {
            Self::Scale { domain, .. } | Self::Script { domain, .. } => *domain,
        }
    }

    pub fn set_domain(&mut self, value: [f64; 2]) {
        match self {
            Self::Scale { domain, .. } | Self::Script { domain, .. } => *domain = value,
        }
    }

    pub fn range(&self) -> [f64; 2] {
        match self {
            Self::Scale { range, .. } | Self::Script { range, .. } => *range,
        }
    }

    /// Whether the domain holds usable bounds
    ///
    /// Columns without any valid value carry infinite bounds, which means
    /// "no value" rather than an error.
    pub fn has_valid_domain(&self) -> bool {
        let [lo, hi] = self.domain();
        lo.is_finite() && hi.is_finite()
    }

    /// Map a raw value, NaN for missing values or a degenerate domain
    pub fn apply(&self, v: f64) -> f64 {
        if v.is_nan() || !self.has_valid_domain() {
            return f64::NAN;
        }
        match self {
            Self::Scale {
                kind,
                domain,
                range,
            } => {
                let t = normalize_pow(v, *domain, kind.exponent());
                lerp(range, t.clamp(0.0, 1.0)).clamp(0.0, 1.0)
            }
            Self::Script {
                domain,
                range,
                evaluator: Some(f),
                ..
            } => {
                let ctx = ScriptContext {
                    domain: *domain,
                    range: *range,
                };
                let r = f(v, &ctx);
                if r.is_nan() {
                    r
                } else {
                    r.clamp(0.0, 1.0)
                }
            }
            Self::Script {
                domain,
                range,
                evaluator: None,
                ..
            } => lerp(range, normalize_pow(v, *domain, 1.0).clamp(0.0, 1.0)).clamp(0.0, 1.0),
        }
    }

    /// Map a normalized value back into raw units for display
    ///
    /// Scripted mappings are not invertible and fall back to the linear inverse.
    pub fn invert(&self, y: f64) -> f64 {
        if y.is_nan() || !self.has_valid_domain() {
            return f64::NAN;
        }
        let (exponent, domain, range) = match self {
            Self::Scale {
                kind,
                domain,
                range,
            } => (kind.exponent(), *domain, *range),
            Self::Script { domain, range, .. } => (1.0, *domain, *range),
        };
        let t = if range[1] == range[0] {
            0.5
        } else {
            (y - range[0]) / (range[1] - range[0])
        };
        let lo = signed_pow(domain[0], exponent);
        let hi = signed_pow(domain[1], exponent);
        signed_pow(lo + t * (hi - lo), 1.0 / exponent)
    }
}

impl fmt::Debug for MappingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale {
                kind,
                domain,
                range,
            } => f
                .debug_struct("Scale")
                .field("kind", kind)
                .field("domain", domain)
                .field("range", range)
                .finish(),
            Self::Script {
                code,
                domain,
                range,
                evaluator,
            } => f
                .debug_struct("Script")
                .field("code", code)
                .field("domain", domain)
                .field("range", range)
                .field("evaluator", &evaluator.is_some())
                .finish(),
        }
    }
}

impl PartialEq for MappingFunction {
    fn eq(&self, other: &Self) -> bool {
        // evaluators are identified by their source
        self.to_desc() == other.to_desc()
    }
}

fn signed_pow(v: f64, exponent: f64) -> f64 {
    if v < 0.0 {
        -(-v).powf(exponent)
    } else {
        v.powf(exponent)
    }
}

fn normalize_pow(v: f64, domain: [f64; 2], exponent: f64) -> f64 {
    let lo = signed_pow(domain[0], exponent);
    let hi = signed_pow(domain[1], exponent);
    if hi == lo {
        return 0.5;
    }
    (signed_pow(v, exponent) - lo) / (hi - lo)
}

fn lerp(range: &[f64; 2], t: f64) -> f64 {
    range[0] + (range[1] - range[0]) * t
}

/// Scan all rows for the extent of a numeric field
///
/// Array-valued cells are flattened and non-numeric entries skipped. A field
/// without any valid number yields `[+inf, -inf]`.
pub fn infer_domain<'a>(rows: impl IntoIterator<Item = &'a Value>, column: &str) -> [f64; 2] {
    rows.into_iter()
        .flat_map(|row| as_numbers(row.get(column)))
        .fold([f64::INFINITY, f64::NEG_INFINITY], |[lo, hi], v| [lo.min(v), hi.max(v)])
}

/// Fill in missing or NaN domain bounds of a numeric descriptor from the data
///
/// Returns `true` when the descriptor changed.
pub fn resolve_domain(desc: &mut ColumnDesc, rows: &[Value]) -> bool {
    let Some(column) = desc.column.clone() else {
        return false;
    };
    let declared = match &desc.map {
        Some(map) => map.domain.or(desc.domain),
        None => desc.domain,
    };
    let resolved = match declared {
        None => infer_domain(rows, &column),
        Some([lo, hi]) if lo.is_nan() || hi.is_nan() => {
            let extent = infer_domain(rows, &column);
            [
                if lo.is_nan() { extent[0] } else { lo },
                if hi.is_nan() { extent[1] } else { hi },
            ]
        }
        Some(_) => return false,
    };
    match &mut desc.map {
        Some(map) => map.domain = Some(resolved),
        None => desc.domain = Some(resolved),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_scripts(_: &str) -> Option<ScriptFn> {
        None
    }

    #[test]
    fn test_linear_round_trip() {
        let m = MappingFunction::linear(-10.0, 30.0);
        let mut last = f64::NEG_INFINITY;
        for i in 0..=40 {
            let x = -10.0 + i as f64;
            let y = m.apply(x);
            assert!(y >= last);
            last = y;
            assert!((m.invert(y) - x).abs() < 1e-9);
        }
        assert_eq!(m.apply(100.0), 1.0);
        assert_eq!(m.apply(-100.0), 0.0);
    }

    #[test]
    fn test_power_laws() {
        let sqrt = MappingFunction::scale(ScaleKind::Sqrt, [0.0, 100.0]);
        assert!((sqrt.apply(25.0) - 0.5).abs() < 1e-12);
        assert!((sqrt.invert(0.5) - 25.0).abs() < 1e-9);

        let pow2 = MappingFunction::scale(ScaleKind::Pow2, [0.0, 10.0]);
        assert!((pow2.apply(5.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_domain_is_missing() {
        let m = MappingFunction::linear(f64::INFINITY, f64::NEG_INFINITY);
        assert!(m.apply(3.0).is_nan());
        assert!(m.invert(0.5).is_nan());

        let flat = MappingFunction::linear(2.0, 2.0);
        assert_eq!(flat.apply(2.0), 0.5);
    }

    #[test]
    fn test_unknown_domain_equality() {
        let unknown = MappingFunction::linear(f64::NAN, f64::NAN);
        assert_eq!(unknown, unknown.clone());
        assert_ne!(unknown, MappingFunction::linear(f64::NAN, 1.0));
        assert_ne!(unknown, MappingFunction::scale(ScaleKind::Sqrt, [f64::NAN, f64::NAN]));
    }

    #[test]
    fn test_scripted_mapping() {
        let eval: ScriptFn = Arc::new(|v, ctx| 1.0 - ctx.normalized(v));
        let m = MappingFunction::script("1 - normalized", [0.0, 10.0], Some(eval));
        assert!((m.apply(2.0) - 0.8).abs() < 1e-12);
        assert_eq!(m.apply(20.0), 0.0);

        let fallback = MappingFunction::script("unknown", [0.0, 10.0], None);
        assert!((fallback.apply(2.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_from_desc() {
        let desc: ColumnDesc = serde_json::from_value(json!({
            "type": "number",
            "column": "v",
            "map": {"type": "pow2", "domain": [0, 4]}
        }))
        .unwrap();
        let m = MappingFunction::from_desc(&desc, &no_scripts);
        assert_eq!(m.domain(), [0.0, 4.0]);
        assert!(matches!(m, MappingFunction::Scale { kind: ScaleKind::Pow2, .. }));
        assert_eq!(m.to_desc().kind, "pow2");
    }

    #[test]
    fn test_infer_domain() {
        let rows = vec![json!({"v": 1}), json!({"v": 5}), json!({"v": null})];
        assert_eq!(infer_domain(&rows, "v"), [1.0, 5.0]);

        let arrays = vec![json!({"v": [3, -2]}), json!({"v": [9]})];
        assert_eq!(infer_domain(&arrays, "v"), [-2.0, 9.0]);

        let empty = vec![json!({"v": "x"})];
        assert_eq!(infer_domain(&empty, "v"), [f64::INFINITY, f64::NEG_INFINITY]);
    }

    #[test]
    fn test_resolve_partial_domain() {
        let rows = vec![json!({"v": 1}), json!({"v": 5})];
        let mut desc = ColumnDesc::number("v").with_domain(0.0, f64::NAN);
        assert!(resolve_domain(&mut desc, &rows));
        assert_eq!(desc.domain, Some([0.0, 5.0]));
        assert!(!resolve_domain(&mut desc, &rows));

        let mut undeclared = ColumnDesc::number("v");
        assert!(resolve_domain(&mut undeclared, &rows));
        assert_eq!(undeclared.domain, Some([1.0, 5.0]));
    }
}
