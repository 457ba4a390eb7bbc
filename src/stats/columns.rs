//! Best-effort column lookup for dataset statistics.
//!
//! Independent of schema reconciliation: a short name list per role, first an
//! exact case-insensitive hit, then any column whose lower-cased name
//! contains one of the names.

const AIR_TEMPERATURE: &[&str] = &["Air temperature [K]", "Air temperature", "air_temperature", "air_temp"];
const PROCESS_TEMPERATURE: &[&str] = &[
    "Process temperature [K]", "Process temperature", "process_temperature", "process_temp",
];
const ROTATIONAL_SPEED: &[&str] = &["Rotational speed [rpm]", "Rotational speed", "rotational_speed", "rpm"];
const TORQUE: &[&str] = &["Torque [Nm]", "torque"];
const TOOL_WEAR: &[&str] = &["Tool wear [min]", "Tool wear", "tool_wear"];
const TYPE: &[&str] = &["Type", "machine_type", "product_type"];
const PRODUCT_ID: &[&str] = &["Product ID", "ProductID", "product_id"];
const MACHINE_ID: &[&str] = &["UDI", "Machine ID", "machine_id", "MachineID"];

/// Column found for each statistics role, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredColumns {
    pub air_temperature: Option<String>,
    pub process_temperature: Option<String>,
    pub rotational_speed: Option<String>,
    pub torque: Option<String>,
    pub tool_wear: Option<String>,
    pub product_type: Option<String>,
    pub product_id: Option<String>,
    pub machine_id: Option<String>,
}

pub fn discover_columns(columns: &[String]) -> DiscoveredColumns {
    DiscoveredColumns {
        air_temperature: find(columns, AIR_TEMPERATURE),
        process_temperature: find(columns, PROCESS_TEMPERATURE),
        rotational_speed: find(columns, ROTATIONAL_SPEED),
        torque: find(columns, TORQUE),
        tool_wear: find(columns, TOOL_WEAR),
        product_type: find(columns, TYPE),
        product_id: find(columns, PRODUCT_ID),
        machine_id: find(columns, MACHINE_ID),
    }
}

fn find(columns: &[String], names: &[&str]) -> Option<String> {
    let exact = names
        .iter()
        .find_map(|n| columns.iter().find(|c| c.trim().eq_ignore_ascii_case(n)));
    let contained = || {
        names.iter().find_map(|n| {
            let n = n.to_lowercase();
            columns.iter().find(|c| c.to_lowercase().contains(&n))
        })
    };
    exact.or_else(contained).cloned()
}
