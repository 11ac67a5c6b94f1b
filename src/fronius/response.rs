use crate::model::{CollectionType, FieldValue};
use crate::Error;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::BTreeMap;

/* Inverter readings wrapped as {"Unit": .., "Value": ..} under Body.Data.
An absent reading is business-meaningful (no output, e.g. at night) and
defaults to 0.0 instead of failing the cycle. */
const COMMON_READINGS: [&str; 9] = [
    "FAC",
    "IAC",
    "IDC",
    "PAC",
    "UAC",
    "UDC",
    "DAY_ENERGY",
    "YEAR_ENERGY",
    "TOTAL_ENERGY",
];

const THREE_PHASE_READINGS: [&str; 6] = [
    "IAC_L1", "IAC_L2", "IAC_L3", "UAC_L1", "UAC_L2", "UAC_L3",
];

const MIN_MAX_READINGS: [&str; 9] = [
    "DAY_PMAX",
    "DAY_UACMAX",
    "DAY_UDCMAX",
    "YEAR_PMAX",
    "YEAR_UACMAX",
    "YEAR_UDCMAX",
    "TOTAL_PMAX",
    "TOTAL_UACMAX",
    "TOTAL_UDCMAX",
];

const DEVICE_STATUS_FIELDS: [&str; 6] = [
    "ErrorCode",
    "LEDColor",
    "LEDState",
    "MgmtTimerRemainingTime",
    "StateToReset",
    "StatusCode",
];

/* Meter values are bare numbers, not {"Value": ..} wrappers, and the meter
schema is assumed always-complete: a missing key is a hard failure. */
const METER_READINGS: [&str; 12] = [
    "Current_AC_Phase_1",
    "Current_AC_Phase_2",
    "Current_AC_Phase_3",
    "Voltage_AC_Phase_1",
    "Voltage_AC_Phase_2",
    "Voltage_AC_Phase_3",
    "PowerReal_P_Phase_1",
    "PowerReal_P_Phase_2",
    "PowerReal_P_Phase_3",
    "PowerReal_P_Sum",
    "EnergyReal_WAC_Sum_Consumed",
    "EnergyReal_WAC_Sum_Produced",
];

const METER_DETAILS: [&str; 3] = ["Manufacturer", "Model", "Serial"];

const LOGGER_NUMERIC_FIELDS: [&str; 3] = ["CO2Factor", "CashFactor", "DeliveryFactor"];

const LOGGER_TEXT_FIELDS: [&str; 6] = [
    "CO2Unit",
    "CashCurrency",
    "HWVersion",
    "PlatformID",
    "SWVersion",
    "UniqueID",
];

/// Project a raw device response onto the flat field set of its collection
/// type. Pure function of the input; field names are disjoint across
/// collection types by construction.
pub fn translate(
    raw: &Value,
    kind: CollectionType,
) -> Result<BTreeMap<String, FieldValue>, Error> {
    match kind {
        CollectionType::CommonInverterData => common_inverter_data(raw),
        CollectionType::ThreePhaseInverterData => {
            zero_defaulted_readings(data_section(raw)?, &THREE_PHASE_READINGS)
        }
        CollectionType::MinMaxInverterData => {
            zero_defaulted_readings(data_section(raw)?, &MIN_MAX_READINGS)
        }
        CollectionType::Meter => meter(raw),
        CollectionType::LoggerInfo => logger_info(raw),
    }
}

/// Extract the device-reported timestamp (`Head.Timestamp`, RFC 3339).
pub fn timestamp(raw: &Value) -> Result<DateTime<FixedOffset>, Error> {
    let text = raw
        .get("Head")
        .and_then(|head| head.get("Timestamp"))
        .and_then(Value::as_str)
        .ok_or_else(|| missing("Head.Timestamp"))?;
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::MalformedResponse(format!("Head.Timestamp: {}", e)))
}

fn missing(path: &str) -> Error {
    Error::MalformedResponse(format!("missing field: {}", path))
}

fn data_section(raw: &Value) -> Result<&Value, Error> {
    raw.get("Body")
        .and_then(|body| body.get("Data"))
        .ok_or_else(|| missing("Body.Data"))
}

fn as_float(value: &Value, path: &str) -> Result<f64, Error> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::MalformedResponse(format!("field {} is not numeric", path))),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            Error::MalformedResponse(format!("field {} is not numeric: {:?}", path, s))
        }),
        _ => Err(Error::MalformedResponse(format!(
            "field {} is not numeric",
            path
        ))),
    }
}

/// Readings wrapped as `{"Value": ..}`; a missing key, missing wrapper or
/// null value reads as 0.0.
fn zero_defaulted_readings(
    data: &Value,
    keys: &[&str],
) -> Result<BTreeMap<String, FieldValue>, Error> {
    let mut fields = BTreeMap::new();
    for key in keys.iter() {
        let value = match data.get(*key).and_then(|reading| reading.get("Value")) {
            None | Some(Value::Null) => 0.0,
            Some(value) => as_float(value, key)?,
        };
        fields.insert((*key).to_string(), FieldValue::Float(value));
    }
    Ok(fields)
}

/// Pass a JSON scalar through preserving its type. Booleans become 0/1
/// integers since the field model is {float, integer, string}.
fn pass_through(value: &Value, path: &str) -> Result<FieldValue, Error> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(FieldValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(FieldValue::Float(f))
            } else {
                Err(Error::MalformedResponse(format!(
                    "field {} is not a representable number",
                    path
                )))
            }
        }
        Value::String(s) => Ok(FieldValue::Text(s.clone())),
        Value::Bool(b) => Ok(FieldValue::Integer(*b as i64)),
        _ => Err(Error::MalformedResponse(format!(
            "field {} is not a scalar",
            path
        ))),
    }
}

fn common_inverter_data(raw: &Value) -> Result<BTreeMap<String, FieldValue>, Error> {
    let data = data_section(raw)?;
    let status = data
        .get("DeviceStatus")
        .ok_or_else(|| missing("Body.Data.DeviceStatus"))?;

    let mut fields = zero_defaulted_readings(data, &COMMON_READINGS)?;
    for key in DEVICE_STATUS_FIELDS.iter() {
        let path = format!("Body.Data.DeviceStatus.{}", key);
        let value = status.get(*key).ok_or_else(|| missing(&path))?;
        fields.insert((*key).to_string(), pass_through(value, &path)?);
    }
    Ok(fields)
}

fn meter(raw: &Value) -> Result<BTreeMap<String, FieldValue>, Error> {
    let data = data_section(raw)?;
    let mut fields = BTreeMap::new();

    for key in METER_READINGS.iter() {
        let path = format!("Body.Data.{}", key);
        let value = data.get(*key).ok_or_else(|| missing(&path))?;
        fields.insert((*key).to_string(), FieldValue::Float(as_float(value, &path)?));
    }

    let details = data
        .get("Details")
        .ok_or_else(|| missing("Body.Data.Details"))?;
    for key in METER_DETAILS.iter() {
        let path = format!("Body.Data.Details.{}", key);
        let value = details
            .get(*key)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(&path))?;
        fields.insert((*key).to_string(), FieldValue::Text(value.to_string()));
    }
    Ok(fields)
}

fn logger_info(raw: &Value) -> Result<BTreeMap<String, FieldValue>, Error> {
    let info = raw
        .get("Body")
        .and_then(|body| body.get("LoggerInfo"))
        .ok_or_else(|| missing("Body.LoggerInfo"))?;

    let mut fields = BTreeMap::new();
    for key in LOGGER_NUMERIC_FIELDS.iter() {
        let path = format!("Body.LoggerInfo.{}", key);
        let value = info.get(*key).ok_or_else(|| missing(&path))?;
        fields.insert((*key).to_string(), FieldValue::Float(as_float(value, &path)?));
    }
    for key in LOGGER_TEXT_FIELDS.iter() {
        let path = format!("Body.LoggerInfo.{}", key);
        let value = info
            .get(*key)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(&path))?;
        fields.insert((*key).to_string(), FieldValue::Text(value.to_string()));
    }
    Ok(fields)
}
