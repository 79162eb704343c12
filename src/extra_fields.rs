use crate::types::ExtraField;

/// Case-insensitive label substring that marks the core-hours field pair.
pub const CORE_HOURS_MARKER: &str = "core";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
	pub name: String,
	pub translation: String,
	/// Key the field value appears under inside a task card.
	pub task_key: String,
}

impl FieldSpec {
	fn from(field: &ExtraField) -> Self {
		Self {
			name: field.name.clone(),
			translation: field.translation.clone(),
			task_key: to_underscore(&field.name),
		}
	}
}

/// The resolved mapping from the two logical core-hours roles to the
/// deployment-specific field identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreHoursFields {
	pub spent: FieldSpec,
	pub planned: FieldSpec,
}

impl CoreHoursFields {
	/// Pick the spent/planned pair out of a task's custom-field metadata.
	///
	/// Keeps the fields whose display label contains the marker, in metadata
	/// order. Anything but exactly two matches means the deployment does not
	/// track core hours the way we expect, and the report goes out without
	/// those columns.
	pub fn resolve(fields: &[ExtraField]) -> Option<Self> {
		let matching: Vec<&ExtraField> = fields
			.iter()
			.filter(|f| f.translation.to_lowercase().contains(CORE_HOURS_MARKER))
			.collect();
		if matching.len() != 2 {
			log::warn!(
				"expected exactly 2 custom fields labelled with {:?}, found {}",
				CORE_HOURS_MARKER,
				matching.len(),
			);
			return None;
		}
		Some(Self {
			spent: FieldSpec::from(matching[0]),
			planned: FieldSpec::from(matching[1]),
		})
	}

	/// Field names to request a task card with.
	pub fn names(&self) -> Vec<String> {
		vec![self.spent.name.clone(), self.planned.name.clone()]
	}
}

/// Derive the task-card key for a field name, CamelCase to snake_case.
pub fn to_underscore(name: &str) -> String {
	let mut out = String::with_capacity(name.len() + 4);
	for (i, c) in name.chars().enumerate() {
		if c.is_uppercase() {
			if i > 0 {
				out.push('_');
			}
			for lower in c.to_lowercase() {
				out.push(lower);
			}
		} else {
			out.push(c);
		}
	}
	out
}

/// Read a numeric card field, treating anything missing or malformed as
/// zero so aggregation stays total-preserving.
pub fn numeric_field(card: &serde_json::Map<String, serde_json::Value>, key: &str) -> f64 {
	match card.get(key) {
		Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
		Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
		_ => 0.0,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn field(name: &str, translation: &str) -> ExtraField {
		ExtraField {
			name: name.to_string(),
			translation: translation.to_string(),
		}
	}

	#[test]
	fn resolves_exactly_two_marked_fields_in_metadata_order() {
		let fields = vec![
			field("Category1000CustomFieldDeadline", "Deadline"),
			field("Category1000CustomFieldCoreSpent", "Core hours spent"),
			field("Category1000CustomFieldCorePlanned", "CORE hours planned"),
		];
		let resolved = CoreHoursFields::resolve(&fields).unwrap();
		assert_eq!(resolved.spent.translation, "Core hours spent");
		assert_eq!(resolved.planned.translation, "CORE hours planned");
		assert_eq!(resolved.spent.task_key, "category1000_custom_field_core_spent");
		assert_eq!(resolved.names(), vec![
			"Category1000CustomFieldCoreSpent".to_string(),
			"Category1000CustomFieldCorePlanned".to_string(),
		]);
	}

	#[test]
	fn ambiguous_metadata_degrades_to_none() {
		// Zero fields at all.
		assert_eq!(CoreHoursFields::resolve(&[]), None);
		// Two fields, neither labelled as core hours.
		let mismatched = vec![field("A", "Deadline"), field("B", "Budget")];
		assert_eq!(CoreHoursFields::resolve(&mismatched), None);
		// Only one match.
		let one = vec![field("A", "Core hours spent"), field("B", "Budget")];
		assert_eq!(CoreHoursFields::resolve(&one), None);
		// Three matches.
		let three = vec![
			field("A", "Core hours spent"),
			field("B", "Core hours planned"),
			field("C", "Core hours approved"),
		];
		assert_eq!(CoreHoursFields::resolve(&three), None);
	}

	#[test]
	fn to_underscore_lowercases_camel_case() {
		assert_eq!(to_underscore("CustomFieldCoreHours"), "custom_field_core_hours");
		assert_eq!(to_underscore("already_flat"), "already_flat");
		assert_eq!(to_underscore(""), "");
	}

	#[test]
	fn numeric_field_treats_bad_values_as_zero() {
		let card: serde_json::Map<String, serde_json::Value> = serde_json::from_str(
			r#"{"spent": 12.5, "planned": "8", "broken": "n/a", "empty": null}"#,
		).unwrap();
		assert_eq!(numeric_field(&card, "spent"), 12.5);
		assert_eq!(numeric_field(&card, "planned"), 8.0);
		assert_eq!(numeric_field(&card, "broken"), 0.0);
		assert_eq!(numeric_field(&card, "empty"), 0.0);
		assert_eq!(numeric_field(&card, "missing"), 0.0);
	}
}
