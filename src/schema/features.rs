use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CanonicalFeature – the fields the classifier was trained on
// ---------------------------------------------------------------------------

/// Whether a feature is parsed as a number or kept as a category label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// One of the fixed input fields of the failure model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalFeature {
    Type,
    AirTemperature,
    ProcessTemperature,
    RotationalSpeed,
    Torque,
    ToolWear,
}

/// A resolved feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            FeatureValue::Category(s) => Some(s),
            FeatureValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) => write!(f, "{v}"),
            FeatureValue::Category(s) => write!(f, "{s}"),
        }
    }
}

impl CanonicalFeature {
    pub const ALL: [CanonicalFeature; 6] = [
        CanonicalFeature::Type,
        CanonicalFeature::AirTemperature,
        CanonicalFeature::ProcessTemperature,
        CanonicalFeature::RotationalSpeed,
        CanonicalFeature::Torque,
        CanonicalFeature::ToolWear,
    ];

    /// Column name used when the model was fitted.
    pub fn display_name(self) -> &'static str {
        match self {
            CanonicalFeature::Type => "Type",
            CanonicalFeature::AirTemperature => "Air temperature [K]",
            CanonicalFeature::ProcessTemperature => "Process temperature [K]",
            CanonicalFeature::RotationalSpeed => "Rotational speed [rpm]",
            CanonicalFeature::Torque => "Torque [Nm]",
            CanonicalFeature::ToolWear => "Tool wear [min]",
        }
    }

    /// Display name without the unit suffix.
    pub fn base_name(self) -> &'static str {
        let name = self.display_name();
        match name.find('[') {
            Some(i) => name[..i].trim_end(),
            None => name,
        }
    }

    pub fn kind(self) -> FeatureKind {
        match self {
            CanonicalFeature::Type => FeatureKind::Categorical,
            _ => FeatureKind::Numeric,
        }
    }

    /// Substitute for a missing or unparseable value. Numeric defaults sit at
    /// typical operating points of the training population.
    pub fn default_value(self) -> FeatureValue {
        match self {
            CanonicalFeature::Type => FeatureValue::Category("M".to_string()),
            CanonicalFeature::AirTemperature => FeatureValue::Number(298.0),
            CanonicalFeature::ProcessTemperature => FeatureValue::Number(308.0),
            CanonicalFeature::RotationalSpeed => FeatureValue::Number(1500.0),
            CanonicalFeature::Torque => FeatureValue::Number(40.0),
            CanonicalFeature::ToolWear => FeatureValue::Number(108.0),
        }
    }

    /// Known header spellings, highest priority first.
    pub fn variants(self) -> &'static [&'static str] {
        match self {
            CanonicalFeature::Type => &[
                "Type", "type", "machine_type", "machine type", "machine-type",
                "machine", "Type_", "machinetype",
            ],
            CanonicalFeature::AirTemperature => &[
                "Air temperature [K]", "Air temperature", "air_temperature",
                "air temperature", "air-temperature", "air_temp", "air temp",
                "Temperature_Air", "air", "temp", "temperature", "airtemp",
            ],
            CanonicalFeature::ProcessTemperature => &[
                "Process temperature [K]", "Process temperature", "process_temperature",
                "process temperature", "process-temperature", "process_temp",
                "process temp", "proc_temp", "proc temp", "Temperature_Process",
                "process", "processtemp",
            ],
            CanonicalFeature::RotationalSpeed => &[
                "Rotational speed [rpm]", "Rotational speed", "rotational_speed",
                "rotational speed", "rotation speed", "rpm", "speed", "Speed",
                "rotation",
            ],
            CanonicalFeature::Torque => &[
                "Torque [Nm]", "Torque", "torque", "torque_nm", "nm", "Torque_Value", "Nm",
            ],
            CanonicalFeature::ToolWear => &[
                "Tool wear [min]", "Tool wear", "tool_wear", "tool wear", "wear",
                "Wear_Tool", "tool", "min",
            ],
        }
    }

    /// Resolve a display or base name, ignoring case.
    pub fn from_name(name: &str) -> Option<CanonicalFeature> {
        let name = name.trim();
        Self::ALL.into_iter().find(|f| {
            f.display_name().eq_ignore_ascii_case(name) || f.base_name().eq_ignore_ascii_case(name)
        })
    }
}

impl fmt::Display for CanonicalFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

// ---------------------------------------------------------------------------
// Vocabulary – the required features and how to recognise them
// ---------------------------------------------------------------------------

/// Ordered (feature, variants) table that drives reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    entries: Vec<(CanonicalFeature, Vec<String>)>,
}

impl Vocabulary {
    /// Built-in variants for the given features, in the given order.
    pub fn new(features: &[CanonicalFeature]) -> Self {
        let entries = features
            .iter()
            .map(|f| (*f, f.variants().iter().map(|v| v.to_string()).collect()))
            .collect();
        Self { entries }
    }

    /// Append extra spellings for a feature after its built-in ones.
    pub fn extend_variants<I, S>(&mut self, feature: CanonicalFeature, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some((_, variants)) = self.entries.iter_mut().find(|(f, _)| *f == feature) {
            for v in extra {
                let v = v.into();
                if !variants.contains(&v) {
                    variants.push(v);
                }
            }
        }
    }

    pub fn features(&self) -> impl Iterator<Item = CanonicalFeature> + '_ {
        self.entries.iter().map(|(f, _)| *f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalFeature, &[String])> {
        self.entries.iter().map(|(f, v)| (*f, v.as_slice()))
    }

    pub fn variants_of(&self, feature: CanonicalFeature) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, v)| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(&CanonicalFeature::ALL)
    }
}
