use itertools::Itertools;

use crate::schema::{SchemaDocument, TypeDefinition, TypeKind};

/// How risky a single schema change is for existing clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSeverity {
	/// Purely additive, existing queries unaffected
	Info,
	/// Additive but can break clients that exhaustively match the type
	Danger,
	/// Removes or retypes something a client may depend on
	Breaking,
}

/// One structural difference between two composed documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
	TypeAdded { name: String },
	TypeRemoved { name: String },
	TypeKindChanged { name: String, from: TypeKind, to: TypeKind },
	FieldAdded { type_name: String, field: String, kind: TypeKind },
	FieldRemoved { type_name: String, field: String },
	FieldTypeChanged { type_name: String, field: String, from: String, to: String },
	EnumValueAdded { type_name: String, value: String },
	EnumValueRemoved { type_name: String, value: String },
	UnionMemberAdded { type_name: String, member: String },
	UnionMemberRemoved { type_name: String, member: String },
}

impl SchemaChange {
	pub fn severity(&self) -> DiffSeverity {
		match self {
			SchemaChange::TypeAdded { .. } => DiffSeverity::Info,
			// Input fields added server-side can reject payloads clients
			// already construct, so they are not merely informational
			SchemaChange::FieldAdded { kind: TypeKind::InputObject, .. } => DiffSeverity::Danger,
			SchemaChange::FieldAdded { .. } => DiffSeverity::Info,
			// New members are additive on the server but break clients that
			// switch exhaustively over the old set
			SchemaChange::EnumValueAdded { .. } | SchemaChange::UnionMemberAdded { .. } => {
				DiffSeverity::Danger
			},
			SchemaChange::TypeRemoved { .. }
			| SchemaChange::TypeKindChanged { .. }
			| SchemaChange::FieldRemoved { .. }
			| SchemaChange::FieldTypeChanged { .. }
			| SchemaChange::EnumValueRemoved { .. }
			| SchemaChange::UnionMemberRemoved { .. } => DiffSeverity::Breaking,
		}
	}
}

/// Structural comparison of two composed documents. Order is deterministic:
/// types sorted by name, changes within a type in definition order.
pub fn diff_documents(old: &SchemaDocument, new: &SchemaDocument) -> Vec<SchemaChange> {
	let mut changes = Vec::new();
	let names = old
		.types
		.keys()
		.chain(new.types.keys())
		.unique()
		.sorted()
		.cloned()
		.collect::<Vec<_>>();

	for name in names {
		match (old.types.get(&name), new.types.get(&name)) {
			(None, Some(_)) => changes.push(SchemaChange::TypeAdded { name }),
			(Some(_), None) => changes.push(SchemaChange::TypeRemoved { name }),
			(Some(before), Some(after)) => diff_type(before, after, &mut changes),
			(None, None) => {},
		}
	}
	changes
}

fn diff_type(before: &TypeDefinition, after: &TypeDefinition, changes: &mut Vec<SchemaChange>) {
	if before.kind != after.kind {
		changes.push(SchemaChange::TypeKindChanged {
			name: before.name.clone(),
			from: before.kind,
			to: after.kind,
		});
		// Field-level comparison is meaningless across kinds
		return;
	}

	match before.kind {
		TypeKind::Enum => {
			for value in before.members.iter().filter(|v| !after.members.contains(v)) {
				changes.push(SchemaChange::EnumValueRemoved {
					type_name: before.name.clone(),
					value: value.clone(),
				});
			}
			for value in after.members.iter().filter(|v| !before.members.contains(v)) {
				changes.push(SchemaChange::EnumValueAdded {
					type_name: before.name.clone(),
					value: value.clone(),
				});
			}
		},
		TypeKind::Union => {
			for member in before.members.iter().filter(|m| !after.members.contains(m)) {
				changes.push(SchemaChange::UnionMemberRemoved {
					type_name: before.name.clone(),
					member: member.clone(),
				});
			}
			for member in after.members.iter().filter(|m| !before.members.contains(m)) {
				changes.push(SchemaChange::UnionMemberAdded {
					type_name: before.name.clone(),
					member: member.clone(),
				});
			}
		},
		TypeKind::Scalar => {},
		TypeKind::Object | TypeKind::Interface | TypeKind::InputObject => {
			for (field, ty) in &before.fields {
				match after.fields.get(field) {
					None => changes.push(SchemaChange::FieldRemoved {
						type_name: before.name.clone(),
						field: field.clone(),
					}),
					Some(new_ty) if new_ty != ty => {
						changes.push(SchemaChange::FieldTypeChanged {
							type_name: before.name.clone(),
							field: field.clone(),
							from: ty.clone(),
							to: new_ty.clone(),
						})
					},
					Some(_) => {},
				}
			}
			for field in after.fields.keys() {
				if !before.fields.contains_key(field) {
					changes.push(SchemaChange::FieldAdded {
						type_name: before.name.clone(),
						field: field.clone(),
						kind: before.kind,
					});
				}
			}
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(sdl: &str) -> SchemaDocument {
		SchemaDocument::parse(sdl).unwrap()
	}

	#[test]
	fn test_identical_documents_produce_no_changes() {
		let a = doc("type Query { invoices: [Invoice] } type Invoice { id: ID }");
		assert!(diff_documents(&a, &a).is_empty());
	}

	#[test]
	fn test_field_swap_is_one_removal_and_one_addition() {
		let old = doc("type Query { a: String }");
		let new = doc("type Query { b: String }");

		let changes = diff_documents(&old, &new);
		assert_eq!(
			changes,
			vec![
				SchemaChange::FieldRemoved { type_name: "Query".into(), field: "a".into() },
				SchemaChange::FieldAdded {
					type_name: "Query".into(),
					field: "b".into(),
					kind: TypeKind::Object,
				},
			]
		);
		assert_eq!(changes[0].severity(), DiffSeverity::Breaking);
		assert_eq!(changes[1].severity(), DiffSeverity::Info);
	}

	#[test]
	fn test_field_retype_is_breaking() {
		let old = doc("type Invoice { total: Int }");
		let new = doc("type Invoice { total: Float }");

		let changes = diff_documents(&old, &new);
		assert_eq!(
			changes,
			vec![SchemaChange::FieldTypeChanged {
				type_name: "Invoice".into(),
				field: "total".into(),
				from: "Int".into(),
				to: "Float".into(),
			}]
		);
		assert_eq!(changes[0].severity(), DiffSeverity::Breaking);
	}

	#[test]
	fn test_input_field_addition_is_danger() {
		let old = doc("input InvoiceFilter { status: String }");
		let new = doc("input InvoiceFilter { status: String after: String }");

		let changes = diff_documents(&old, &new);
		assert_eq!(
			changes,
			vec![SchemaChange::FieldAdded {
				type_name: "InvoiceFilter".into(),
				field: "after".into(),
				kind: TypeKind::InputObject,
			}]
		);
		assert_eq!(changes[0].severity(), DiffSeverity::Danger);
	}

	#[test]
	fn test_enum_value_addition_is_danger() {
		let old = doc("enum Status { OPEN }");
		let new = doc("enum Status { OPEN CLOSED }");

		let changes = diff_documents(&old, &new);
		assert_eq!(
			changes,
			vec![SchemaChange::EnumValueAdded {
				type_name: "Status".into(),
				value: "CLOSED".into(),
			}]
		);
		assert_eq!(changes[0].severity(), DiffSeverity::Danger);
	}

	#[test]
	fn test_union_member_removal_is_breaking() {
		let old = doc("union Payment = Card | Transfer type Card { n: Int } type Transfer { n: Int }");
		let new = doc("union Payment = Card type Card { n: Int } type Transfer { n: Int }");

		let changes = diff_documents(&old, &new);
		assert_eq!(
			changes,
			vec![SchemaChange::UnionMemberRemoved {
				type_name: "Payment".into(),
				member: "Transfer".into(),
			}]
		);
	}

	#[test]
	fn test_type_kind_change_masks_field_diffs() {
		let old = doc("type Thing { a: String }");
		let new = doc("input Thing { a: String b: Int }");

		let changes = diff_documents(&old, &new);
		assert_eq!(
			changes,
			vec![SchemaChange::TypeKindChanged {
				name: "Thing".into(),
				from: TypeKind::Object,
				to: TypeKind::InputObject,
			}]
		);
	}

	#[test]
	fn test_added_and_removed_types() {
		let old = doc("type A { x: Int } type Query { a: A }");
		let new = doc("type B { y: Int } type Query { a: B }");

		let changes = diff_documents(&old, &new);
		assert!(changes.contains(&SchemaChange::TypeAdded { name: "B".into() }));
		assert!(changes.contains(&SchemaChange::TypeRemoved { name: "A".into() }));
	}
}
