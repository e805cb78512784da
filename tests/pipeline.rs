use fhir_schema_graph::field::{FieldKind, Ordinality, StorageType};
use fhir_schema_graph::node::DerivedNode;
use fhir_schema_graph::{
    BuildPhase, EdgeKey, Graph, Node, NodeKind, SchemaError, build_descriptors, build_graph,
    render, source,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const RESOURCE: &[&str] = &[
    "[ a fhir:Resource;",
    "  fhir:Resource.id [ id ]; # 0..1 Logical id of this artifact",
    "  fhir:Resource.language [ code ]; # 0..1 Language of the resource content",
    "]",
];

const DOMAIN_RESOURCE: &[&str] = &[
    "[ a fhir:DomainResource;",
    "  # from Resource: .id and .language",
    "  fhir:DomainResource.extension [ Extension ], ... ; # 0..* Additional content defined by implementations",
    "  fhir:DomainResource.modifierExtension [ Extension ], ... ; # 0..* Extensions that cannot be ignored",
    "]",
];

const BACKBONE_ELEMENT: &[&str] = &[
    "[ a fhir:BackboneElement;",
    "  # from Element: .id and .extension",
    "  fhir:BackboneElement.modifierExtension [ Extension ], ... ; # 0..* Extensions that cannot be ignored even if unrecognized",
    "]",
];

const EXTENSION: &[&str] = &[
    "[ a fhir:Extension;",
    "  # from Element: .extension",
    "  fhir:Extension.url [ uri ]; # 1..1 identifies the meaning of the extension",
    "]",
];

const CODEABLE_CONCEPT: &[&str] = &[
    "[ a fhir:CodeableConcept;",
    "  # from Element: .id",
    "  fhir:CodeableConcept.text [ string ]; # 0..1 Plain text representation of the concept",
    "]",
];

const ORGANIZATION: &[&str] = &[
    "[ a fhir:Organization;",
    "  # from DomainResource: .id",
    "  fhir:Organization.name [ string ]; # 0..1 Name used for the organization",
    "]",
];

const GROUP: &[&str] = &[
    "[ a fhir:Group;",
    "  # from DomainResource: .id",
    "  fhir:Group.name [ string ]; # 0..1 Label for Group",
    "]",
];

const PATIENT: &[&str] = &[
    "[ a fhir:Patient;",
    "  # from DomainResource: .id, .extension, and .modifierExtension",
    "  fhir:Patient.active [ boolean ]; # 0..1 Whether this patient's record is in active use",
    "  fhir:Patient.gender [ code ]; # 0..1 male | female | other | unknown",
    "  fhir:Patient.contact [ # 0..* A contact party for the patient",
    "    fhir:Patient.contact.name [ string ]; # 0..1 A name associated with the contact person",
    "    fhir:Patient.contact.organization [ Reference(Organization|Patient) ]; # 0..1 Organization that is associated with the contact",
    "    fhir:Patient.contact.period [ # 0..1 The period during which this contact person is valid",
    "      fhir:Patient.contact.period.start [ dateTime ]; # 0..1 Starting time with inclusive boundary",
    "    ];",
    "  ], ...;",
    "  fhir:Patient.managingOrganization [ Reference(Organization) ]; # 0..1 Organization that is the custodian of the patient record",
    "  fhir:Patient.link [ # 0..* Link to another patient resource",
    "    fhir:Patient.link.other [ Reference(Patient) ]; # 1..1 The other patient resource",
    "    fhir:Patient.link.type [ code ]; # 1..1 replaced-by | replaces | refer | seealso",
    "  ], ...;",
    "]",
];

const OBSERVATION: &[&str] = &[
    "[ a fhir:Observation;",
    "  # from DomainResource: .id",
    "  fhir:Observation.code [ CodeableConcept ]; # Type of observation (code / type)",
    "  fhir:Observation.subject [ Reference(Patient|Group) ]; # 0..1 Who the observation is about",
    "  fhir:Observation.focus [ Reference(Patient|Group|Observation) ], ... ; # 0..* What the observation is about",
    "  fhir:Observation.value[x] [ Reference(Patient|Group) ]; # 0..1 Actual result",
    "]",
];

const CARE_PLAN: &[&str] = &[
    "[ a fhir:CarePlan;",
    "  # from DomainResource: .id",
    "  fhir:CarePlan.basedOn [ Reference(CarePlan) ], ... ; # 0..* Fulfills plan, proposal or order",
    "  fhir:CarePlan.partOf [ Reference(CarePlan) ], ... ; # 0..* Part of referenced CarePlan",
    "]",
];

const CLAIM: &[&str] = &[
    "[ a fhir:Claim;",
    "  # from DomainResource: .id",
    "  fhir:Claim.status [ code ]; # 1..1 active | cancelled | draft | entered-in-error",
    "  fhir:Claim.related [ # 0..* Prior or corollary claims",
    "    fhir:Claim.related.claim [ Reference(Claim) ]; # 0..1 Reference to the related claim",
    "  ], ...;",
    "]",
];

const ALL: &[&[&str]] = &[
    RESOURCE,
    DOMAIN_RESOURCE,
    BACKBONE_ELEMENT,
    EXTENSION,
    CODEABLE_CONCEPT,
    ORGANIZATION,
    GROUP,
    PATIENT,
    OBSERVATION,
    CARE_PLAN,
    CLAIM,
];

fn graph() -> Graph {
    build_graph(ALL.iter().copied()).unwrap()
}

fn key(origin: &str, field: &str, destination: &str) -> EdgeKey {
    EdgeKey {
        origin: origin.into(),
        field: field.into(),
        destination: destination.into(),
    }
}

fn strings(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[test]
fn build_runs_every_phase() {
    let graph = graph();
    assert_eq!(graph.phase(), BuildPhase::Complete);

    let meta: Vec<&str> = graph.meta_nodes().iter().map(String::as_str).collect();
    assert_eq!(meta, vec!["BackboneElement", "DomainResource", "Element"]);
    assert!(!graph.is_meta("Resource"));
}

#[test]
fn primitive_fields_become_plain_columns() {
    let descriptors = build_descriptors(&graph(), &[]).unwrap();
    let patient = descriptors.table("patient").unwrap();

    let active = patient.column("active").unwrap();
    assert_eq!(active.storage_type, StorageType::Boolean);
    assert!(active.nullable);
    assert!(!active.unique);

    let gender = patient.column("gender").unwrap();
    assert_eq!(
        gender.storage_type,
        StorageType::Enum {
            name: "patient_gender_code".into(),
            options: strings(&["female", "male", "other", "unknown"]),
        }
    );

    let link_type = descriptors.table("patient_link").unwrap().column("type").unwrap();
    assert!(!link_type.nullable);
}

#[test]
fn ordinality_defaults_to_optional_single() {
    let graph = graph();
    let observation = graph.node("Observation").unwrap();
    let code = observation.fields().get("code").cloned().unwrap();
    assert_eq!(code.ordinality, Ordinality::default());
    assert_eq!(
        code.kind,
        FieldKind::Exclusive {
            target: "CodeableConcept".into()
        }
    );

    let edge = graph
        .edge(&key("Observation", "code", "CodeableConcept"))
        .unwrap();
    assert_eq!(edge.column_name(), "code_id");
}

#[test]
fn polymorphic_references_get_a_junction_node() {
    let graph = graph();
    assert_eq!(
        graph.node("Observation.value"),
        Some(&Node::Derived(DerivedNode {
            key: "Observation.value".into(),
            derived_from: "Observation".into(),
        }))
    );
    for target in ["Patient", "Group"] {
        let edge = graph.edge(&key("Observation.value", "value", target)).unwrap();
        assert_eq!(edge.origin_kind, NodeKind::Derived);
        assert!(edge.is_back_reference());
    }
    // Single-valued: the owner points at the junction.
    let link = graph
        .edge(&key("Observation", "value", "Observation.value"))
        .unwrap();
    assert_eq!(link.column_name(), "value_id");

    // Many-valued: the junction points back at the owner.
    assert!(
        graph
            .edge(&key("Observation.focus", "focus", "Observation"))
            .is_some()
    );
    assert!(
        graph
            .edge(&key("Observation", "focus", "Observation.focus"))
            .is_none()
    );
}

#[test]
fn parallel_many_valued_references_are_qualified() {
    let graph = graph();
    let based_on = graph.edge(&key("CarePlan", "basedOn", "CarePlan")).unwrap();
    let part_of = graph.edge(&key("CarePlan", "partOf", "CarePlan")).unwrap();

    assert!(based_on.shares_references && part_of.shares_references);
    assert!(!based_on.self_referencing_back_reference);
    assert_eq!(based_on.column_name(), "care_plan_based_on_id");
    assert_eq!(part_of.column_name(), "care_plan_part_of_id");
    assert_eq!(based_on.array_relationship_name(), "based_on");
    assert_eq!(part_of.array_relationship_name(), "part_of");
}

#[test]
fn extension_edges_on_one_entity_are_qualified() {
    let graph = graph();
    let extension = graph.edge(&key("Extension", "extension", "Patient")).unwrap();
    let modifier = graph
        .edge(&key("Extension", "modifierExtension", "Patient"))
        .unwrap();
    assert_eq!(extension.column_name(), "patient_extension_id");
    assert_eq!(modifier.column_name(), "patient_modifier_extension_id");
}

#[test]
fn backbone_self_references_get_back_prefixed_columns() {
    let graph = graph();
    let claim = graph.edge(&key("Claim.related", "claim", "Claim")).unwrap();
    let related = graph.edge(&key("Claim.related", "related", "Claim")).unwrap();

    assert!(claim.self_referencing_back_reference);
    assert!(!related.self_referencing_back_reference);
    assert_eq!(claim.column_name(), "back_claim_id");
    assert_eq!(related.column_name(), "claim_id");

    let descriptors = build_descriptors(&graph, &[]).unwrap();
    let columns: BTreeSet<&str> = descriptors
        .foreign_keys_from("claim_related")
        .map(|fk| fk.foreign_key_column.as_str())
        .collect();
    assert_eq!(columns, BTreeSet::from(["back_claim_id", "claim_id"]));
}

#[test]
fn the_many_side_holds_the_foreign_key() {
    let graph = graph();
    for edge in graph.edges() {
        let Some(field) = &edge.field else {
            assert_eq!(edge.origin, "Any");
            continue;
        };
        if edge.origin_kind == NodeKind::Derived {
            assert_eq!(edge.origin, format!("{}.{}", field.origin, field.key));
        } else if field.ordinality.is_many() {
            assert_eq!(edge.destination, field.origin, "{:?}", edge.key());
        } else {
            assert_eq!(edge.origin, field.origin, "{:?}", edge.key());
        }
    }
}

#[test]
fn edge_identities_are_unique() {
    let graph = graph();
    let keys: Vec<EdgeKey> = graph.edges().map(|e| e.key()).collect();
    let unique: BTreeSet<&EdgeKey> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
    for k in &keys {
        assert_eq!(graph.edge(k).map(|e| e.key()), Some(k.clone()));
    }
}

#[test]
fn empty_filter_selects_every_concrete_entity() {
    let graph = graph();
    let concrete: BTreeSet<String> = graph.concrete_nodes().map(|n| n.key().to_string()).collect();
    assert_eq!(graph.writable_nodes(&[]).unwrap(), concrete);
    assert!(!concrete.contains("DomainResource"));
    assert!(concrete.contains("Observation.focus"));
}

#[test]
fn requested_resources_bring_their_subnodes() {
    let graph = graph();
    let writable = graph.writable_nodes(&strings(&["Patient"])).unwrap();
    let keys: Vec<&str> = writable.iter().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["Patient", "Patient.contact", "Patient.contact.period", "Patient.link"]
    );
}

#[test]
fn junction_nodes_owned_by_subnodes_are_not_selected() {
    let graph = graph();
    assert!(matches!(
        graph.node("Patient.contact.organization"),
        Some(Node::Derived(DerivedNode { derived_from, .. })) if derived_from == "Patient.contact"
    ));

    for filter in [&["Patient"][..], &["Patient", "Organization"][..]] {
        let writable = graph.writable_nodes(&strings(filter)).unwrap();
        assert!(writable.contains("Patient.contact"));
        assert!(!writable.contains("Patient.contact.organization"), "{filter:?}");
    }
}

#[test]
fn junction_nodes_follow_requested_destinations() {
    let graph = graph();

    let alone = graph.writable_nodes(&strings(&["Observation"])).unwrap();
    let keys: Vec<&str> = alone.iter().map(String::as_str).collect();
    assert_eq!(keys, vec!["Observation", "Observation.focus"]);

    let with_patient = graph
        .writable_nodes(&strings(&["Observation", "Patient"]))
        .unwrap();
    for junction in ["Observation.focus", "Observation.subject", "Observation.value"] {
        assert!(with_patient.contains(junction), "{junction}");
    }
}

#[test]
fn unknown_filter_keys_are_rejected() {
    let err = graph().writable_nodes(&strings(&["Nope"])).unwrap_err();
    assert!(matches!(err, SchemaError::Selection { ref key } if key == "Nope"));
}

#[test]
fn duplicate_entities_abort_the_build() {
    let err = build_graph([RESOURCE, ORGANIZATION, DOMAIN_RESOURCE, ORGANIZATION]).unwrap_err();
    assert!(matches!(err, SchemaError::Model { ref entity, .. } if entity == "Organization"));
}

#[test]
fn missing_reference_targets_abort_the_build() {
    let err = build_graph([RESOURCE, DOMAIN_RESOURCE, EXTENSION, OBSERVATION]).unwrap_err();
    assert!(matches!(err, SchemaError::Resolution { .. }), "{err}");
}

#[test]
fn filtered_descriptors_stay_inside_the_selection() {
    let descriptors = build_descriptors(&graph(), &strings(&["Observation"])).unwrap();
    let tables: Vec<&str> = descriptors.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tables, vec!["observation", "observation_focus"]);

    let fks: Vec<(&str, &str, &str)> = descriptors
        .foreign_keys
        .iter()
        .map(|fk| {
            (
                fk.source_table.as_str(),
                fk.foreign_key_column.as_str(),
                fk.destination_table.as_str(),
            )
        })
        .collect();
    assert_eq!(fks, vec![("observation_focus", "observation_id", "observation")]);
}

#[test]
fn source_directory_to_sink_files() {
    let pages = tempfile::tempdir().unwrap();
    let mut text = String::from("@prefix fhir: <http://hl7.org/fhir/> .\n\n");
    for block in ALL {
        text.push_str(&block.join("\n"));
        text.push_str("\n\n");
    }
    std::fs::write(pages.path().join("fhir.ttl"), text).unwrap();

    let pages = source::read_pages(pages.path()).unwrap();
    let blocks: Vec<&Vec<String>> = pages
        .iter()
        .flat_map(|p| &p.blocks)
        .map(|b| &b.lines)
        .collect();
    assert_eq!(blocks.len(), ALL.len());

    let graph = build_graph(blocks).unwrap();
    let descriptors = build_descriptors(&graph, &strings(&["CarePlan"])).unwrap();

    let out = tempfile::tempdir().unwrap();
    let sql_path = out.path().join("schema.sql");
    std::fs::write(&sql_path, "stale").unwrap();
    render::write_sql(&sql_path, &descriptors).unwrap();
    render::write_metadata(&out.path().join("metadata"), &descriptors).unwrap();

    let sql = std::fs::read_to_string(&sql_path).unwrap();
    assert!(!sql.contains("stale"));
    assert!(sql.contains("CREATE TABLE \"care_plan\" ("));
    assert!(sql.contains(
        "ALTER TABLE \"care_plan\" ADD COLUMN \"care_plan_based_on_id\" integer REFERENCES \"care_plan\" (\"_id\");"
    ));

    let index =
        std::fs::read_to_string(out.path().join("metadata").join(render::TABLES_FILE)).unwrap();
    assert_eq!(index, "- \"!include public_care_plan.yaml\"\n");
    assert!(out.path().join("metadata/public_care_plan.yaml").exists());
}
