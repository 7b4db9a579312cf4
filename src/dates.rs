use chrono::NaiveDate;
use serde::Deserialize;

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Window {
        #[serde(deserialize_with = "deserialize_date")]
        start: NaiveDate,
    }

    #[test]
    fn parses_iso_dates_with_whitespace() {
        assert_eq!(
            parse_date(" 2025-07-04 "),
            Ok(NaiveDate::from_ymd_opt(2025, 7, 4).expect("valid date"))
        );
        assert!(parse_date("07/04/2025").is_err());
    }

    #[test]
    fn deserializer_reports_bad_dates() {
        let parsed: Window =
            serde_json::from_str(r#"{"start": "2025-07-04"}"#).expect("valid json");
        assert_eq!(parsed.start, NaiveDate::from_ymd_opt(2025, 7, 4).expect("valid date"));

        let err = serde_json::from_str::<Window>(r#"{"start": "July 4th"}"#)
            .expect_err("invalid date rejected");
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }
}
