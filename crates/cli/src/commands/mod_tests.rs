// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn parse_payload_object() {
    let payload = parse_payload(r#"{"id":"O1","qty":2}"#).unwrap();
    assert_eq!(payload.get("id").unwrap(), "O1");
    assert_eq!(payload.get("qty").unwrap(), 2);
}

#[parameterized(
    array = { "[1,2]", "an array" },
    string = { r#""x""#, "a string" },
    number = { "3", "a number" },
    null = { "null", "null" },
)]
fn parse_payload_rejects_non_objects(raw: &str, kind: &str) {
    let err = parse_payload(raw).unwrap_err();
    assert!(matches!(err, Error::Core(ms_core::Error::InvalidAction(_))));
    assert!(err.to_string().contains(kind));
}

#[test]
fn parse_payload_rejects_bad_json() {
    assert!(matches!(parse_payload("{oops"), Err(Error::Json(_))));
}

#[test]
fn format_time_is_utc() {
    let t = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    assert_eq!(format_time(&t), "1970-01-01 00:00:00 UTC");
}
