use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;

/// Schema tag identifying which of the five known response shapes a device
/// payload follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    CommonInverterData,
    ThreePhaseInverterData,
    MinMaxInverterData,
    Meter,
    LoggerInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

/// One poll cycle's combined metric fields, timestamped from the device.
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Geographic position of the installation, used for sunrise/sunset.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}
