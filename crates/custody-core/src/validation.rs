use custody_types::{EventType, RegisterRequest};

use crate::error::{CustodyError, CustodyResult, FieldViolation};

/// Check a registration request, reporting every violated field at once.
///
/// A field is present when it is non-empty; whitespace counts as a value.
/// Returns the parsed event type on success.
pub fn validate_request(request: &RegisterRequest) -> CustodyResult<EventType> {
    let mut violations = Vec::new();

    let event_type = if request.event_type.is_empty() {
        violations.push(FieldViolation::new("eventType", "is required"));
        None
    } else {
        match request.event_type.parse::<EventType>() {
            Ok(t) => Some(t),
            Err(_) => {
                let allowed: Vec<_> = EventType::ALL.iter().map(EventType::as_str).collect();
                violations.push(FieldViolation::new(
                    "eventType",
                    format!(
                        "{:?} is not one of: {}",
                        request.event_type,
                        allowed.join(", ")
                    ),
                ));
                None
            }
        }
    };

    for (field, value) in [
        ("productId", &request.product_id),
        ("payload", &request.payload),
        ("actor", &request.actor),
    ] {
        if value.is_empty() {
            violations.push(FieldViolation::new(field, "is required"));
        }
    }

    match event_type {
        Some(t) if violations.is_empty() => Ok(t),
        _ => Err(CustodyError::Validation(violations)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_request() {
        let req = RegisterRequest::new("manufacture", "LOT-1", r#"{"temp":4}"#, "plant-7");
        assert_eq!(validate_request(&req).unwrap(), EventType::Manufacture);
    }

    #[test]
    fn reports_every_missing_field() {
        let err = validate_request(&RegisterRequest::default()).unwrap_err();
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["eventType", "productId", "payload", "actor"]);
    }

    #[test]
    fn rejects_unknown_event_type_alongside_other_fields() {
        let req = RegisterRequest::new("shipping", "LOT-1", "{}", "");
        let err = validate_request(&req).unwrap_err();
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["eventType", "actor"]);
        assert!(err.violations()[0].reason.contains("manufacture"));
    }

    #[test]
    fn event_type_is_case_sensitive() {
        let req = RegisterRequest::new("Manufacture", "LOT-1", "{}", "a");
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn whitespace_counts_as_a_value() {
        let req = RegisterRequest::new("receipt", " ", "  ", "\t");
        assert_eq!(validate_request(&req).unwrap(), EventType::Receipt);

        let err = validate_request(&RegisterRequest::new(" ", "LOT-1", "{}", "a")).unwrap_err();
        assert_eq!(err.violations()[0].field, "eventType");
        assert!(err.violations()[0].reason.contains("not one of"));
    }
}
