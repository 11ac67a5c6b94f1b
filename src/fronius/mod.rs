pub mod response;

use crate::model::CollectionType;
use crate::Error;
use serde_json::Value;

/// Fetch the raw body of one telemetry endpoint. Connection-level problems
/// classify as transient; anything else (e.g. an HTTP error status while
/// reading the body) is unclassified.
pub async fn fetch(client: &reqwest::Client, url: String) -> Result<String, Error> {
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(classify_fetch_error)?;
    response.text().await.map_err(classify_fetch_error)
}

fn classify_fetch_error(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::TransientNetwork(e.to_string())
    } else {
        Error::Unclassified(e.to_string())
    }
}

/// Determine which of the five known schemas a raw response follows.
///
/// `Head.RequestArguments.DataCollection` takes precedence, then
/// `Head.RequestArguments.DeviceClass`; responses carrying neither are
/// recognized as logger info by the `Body.LoggerInfo` key.
pub fn classify(raw: &Value) -> Result<CollectionType, Error> {
    let arguments = raw.get("Head").and_then(|head| head.get("RequestArguments"));

    if let Some(collection) = arguments
        .and_then(|args| args.get("DataCollection"))
        .and_then(Value::as_str)
    {
        return match collection {
            "CommonInverterData" => Ok(CollectionType::CommonInverterData),
            "3PInverterData" => Ok(CollectionType::ThreePhaseInverterData),
            "MinMaxInverterData" => Ok(CollectionType::MinMaxInverterData),
            other => Err(Error::MalformedResponse(format!(
                "unknown data collection type: {}",
                other
            ))),
        };
    }

    if let Some(class) = arguments
        .and_then(|args| args.get("DeviceClass"))
        .and_then(Value::as_str)
    {
        return match class {
            "Meter" => Ok(CollectionType::Meter),
            other => Err(Error::MalformedResponse(format!(
                "unknown device class: {}",
                other
            ))),
        };
    }

    if raw
        .get("Body")
        .map(|body| body.get("LoggerInfo").is_some())
        .unwrap_or(false)
    {
        return Ok(CollectionType::LoggerInfo);
    }

    Err(Error::MalformedResponse(String::from(
        "unknown data collection type",
    )))
}
