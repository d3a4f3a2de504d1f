// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AcroForm filling — set /V on text fields by fully-qualified name.

use std::collections::{BTreeMap, HashSet};

use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::{FieldPolicy, FilledForm, FormFill};
use lopdf::{Document, Object, ObjectId, StringFormat};
use tracing::{debug, info, instrument, warn};

use crate::pdf::reader::{PdfReader, save};

/// Field hierarchies deeper than this are treated as malformed.
const MAX_FIELD_DEPTH: usize = 32;

/// A terminal form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Fully-qualified name, parts joined with `.`.
    pub name: String,
    /// Field type (`Tx`, `Btn`, `Ch`, `Sig`), inherited from ancestors when
    /// the field itself has none.
    pub kind: String,
    id: ObjectId,
    /// Widget annotations whose appearance streams go stale on fill.
    widgets: Vec<ObjectId>,
}

impl FormField {
    pub fn is_text(&self) -> bool {
        self.kind == "Tx"
    }
}

/// Every terminal field in the document's AcroForm, in document order.
pub fn list_fields(document: &Document) -> Vec<FormField> {
    let Some(roots) = acroform_fields(document) else {
        return Vec::new();
    };
    let mut fields = Vec::new();
    let mut visited = HashSet::new();
    for id in roots {
        collect(document, id, "", None, 0, &mut visited, &mut fields);
    }
    fields
}

/// Fill text fields from `form.values`.
///
/// Names that do not match a text field (absent, or a checkbox, choice or
/// signature field) are skipped under [`FieldPolicy::BestEffort`] and
/// reported back; under [`FieldPolicy::Strict`] they fail the whole fill.
#[instrument(skip_all, fields(values = form.values.len(), policy = ?form.policy))]
pub fn fill(pdf: &[u8], form: &FormFill) -> Result<FilledForm> {
    let mut document = PdfReader::from_bytes(pdf)?.into_document();

    let text_fields: BTreeMap<String, FormField> = list_fields(&document)
        .into_iter()
        .filter(FormField::is_text)
        .map(|f| (f.name.clone(), f))
        .collect();

    let (known, skipped): (Vec<_>, Vec<_>) = form
        .values
        .keys()
        .cloned()
        .partition(|name| text_fields.contains_key(name));

    if !skipped.is_empty() {
        match form.policy {
            FieldPolicy::Strict => {
                return Err(EphemeraError::Validation(format!(
                    "unknown form field(s): {}",
                    skipped.join(", ")
                )));
            }
            FieldPolicy::BestEffort => {
                warn!(skipped = ?skipped, "Skipping unknown form fields");
            }
        }
    }

    for name in &known {
        let field = &text_fields[name];
        let value = &form.values[name];
        document
            .get_dictionary_mut(field.id)
            .map_err(|err| EphemeraError::TransformFailed(format!("cannot update field: {err}")))?
            .set("V", text_string(value));

        for widget in &field.widgets {
            if let Ok(dict) = document.get_dictionary_mut(*widget) {
                dict.remove(b"AP");
            }
        }
        debug!(field = %name, "Field filled");
    }

    if !known.is_empty() {
        set_need_appearances(&mut document)?;
    }

    info!(filled = known.len(), skipped = skipped.len(), "Form fill complete");
    Ok(FilledForm {
        bytes: save(&mut document)?,
        filled: known,
        skipped,
    })
}

fn root_id(document: &Document) -> Option<ObjectId> {
    document.trailer.get(b"Root").ok()?.as_reference().ok()
}

/// References in /AcroForm /Fields, wherever the AcroForm lives.
fn acroform_fields(document: &Document) -> Option<Vec<ObjectId>> {
    let catalog = document.get_dictionary(root_id(document)?).ok()?;
    let acroform = match catalog.get(b"AcroForm").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let fields = match acroform.get(b"Fields").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?.as_array().ok()?,
        Object::Array(items) => items,
        _ => return None,
    };
    Some(fields.iter().filter_map(|f| f.as_reference().ok()).collect())
}

fn collect(
    document: &Document,
    id: ObjectId,
    parent_name: &str,
    parent_kind: Option<&str>,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_FIELD_DEPTH {
        warn!(?id, "Form field hierarchy too deep, ignoring the rest");
        return;
    }
    // Each field object is walked once; /Kids cycles and shared subtrees
    // would otherwise make the walk exponential.
    if !visited.insert(id) {
        debug!(?id, "Form field already visited, skipping");
        return;
    }
    let Ok(dict) = document.get_dictionary(id) else {
        return;
    };

    let name = match dict.get(b"T").ok().and_then(|t| t.as_str().ok()) {
        Some(raw) if parent_name.is_empty() => decode_text_string(raw),
        Some(raw) => format!("{parent_name}.{}", decode_text_string(raw)),
        None => parent_name.to_string(),
    };
    let kind = match dict.get(b"FT") {
        Ok(Object::Name(ft)) => Some(String::from_utf8_lossy(ft).into_owned()),
        _ => parent_kind.map(str::to_string),
    };

    let kids: Vec<ObjectId> = match dict.get(b"Kids") {
        Ok(Object::Array(items)) => items.iter().filter_map(|k| k.as_reference().ok()).collect(),
        _ => Vec::new(),
    };

    // Kids without /T are widget annotations of this field, not sub-fields.
    let (sub_fields, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids.into_iter().partition(|kid| {
        document
            .get_dictionary(*kid)
            .map(|k| k.has(b"T"))
            .unwrap_or(false)
    });

    if sub_fields.is_empty() {
        if name.is_empty() {
            return;
        }
        let mut all_widgets = widgets;
        all_widgets.push(id);
        out.push(FormField {
            name,
            kind: kind.unwrap_or_default(),
            id,
            widgets: all_widgets,
        });
    } else {
        for kid in sub_fields {
            collect(document, kid, &name, kind.as_deref(), depth + 1, visited, out);
        }
    }
}

fn set_need_appearances(document: &mut Document) -> Result<()> {
    let root = root_id(document)
        .ok_or_else(|| EphemeraError::TransformFailed("document has no catalog".into()))?;

    let acroform_ref = document
        .get_dictionary(root)
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|obj| obj.as_reference().ok());

    let acroform = match acroform_ref {
        Some(id) => document.get_dictionary_mut(id),
        None => document
            .get_dictionary_mut(root)
            .and_then(|catalog| catalog.get_mut(b"AcroForm"))
            .and_then(Object::as_dict_mut),
    }
    .map_err(|err| EphemeraError::TransformFailed(format!("cannot update AcroForm: {err}")))?;

    acroform.set("NeedAppearances", Object::Boolean(true));
    Ok(())
}

/// Encode a PDF text string: literal bytes for ASCII, UTF-16BE with BOM
/// otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, or single-byte).
fn decode_text_string(raw: &[u8]) -> String {
    match raw {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => raw.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::form_pdf;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn field_value(pdf: &[u8], name: &str) -> Option<Vec<u8>> {
        let doc = Document::load_mem(pdf).unwrap();
        let field = list_fields(&doc).into_iter().find(|f| f.name == name)?;
        let dict = doc.get_dictionary(field.id).unwrap();
        dict.get(b"V").ok().and_then(|v| v.as_str().ok()).map(<[u8]>::to_vec)
    }

    #[test]
    fn lists_fields_with_types() {
        let doc = Document::load_mem(&form_pdf(&["name", "city"])).unwrap();
        let fields = list_fields(&doc);
        let names: Vec<_> = fields.iter().map(|f| (f.name.as_str(), f.kind.as_str())).collect();
        assert_eq!(names, vec![("name", "Tx"), ("city", "Tx"), ("agree", "Btn")]);
    }

    #[test]
    fn best_effort_reports_skipped_fields() {
        let form = FormFill {
            values: values(&[("name", "Ada"), ("nickname", "x"), ("agree", "Yes")]),
            policy: FieldPolicy::BestEffort,
        };
        let filled = fill(&form_pdf(&["name", "city"]), &form).unwrap();

        assert_eq!(filled.filled, vec!["name"]);
        assert_eq!(filled.skipped, vec!["agree", "nickname"]);
        assert_eq!(field_value(&filled.bytes, "name"), Some(b"Ada".to_vec()));
        assert_eq!(field_value(&filled.bytes, "city"), None);
    }

    #[test]
    fn strict_policy_rejects_unknown_fields() {
        let form = FormFill {
            values: values(&[("name", "Ada"), ("nickname", "x")]),
            policy: FieldPolicy::Strict,
        };
        match fill(&form_pdf(&["name"]), &form) {
            Err(EphemeraError::Validation(msg)) => assert!(msg.contains("nickname")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn non_ascii_values_use_utf16() {
        let form = FormFill {
            values: values(&[("city", "Zürich")]),
            policy: FieldPolicy::Strict,
        };
        let filled = fill(&form_pdf(&["city"]), &form).unwrap();
        let raw = field_value(&filled.bytes, "city").unwrap();
        assert_eq!(&raw[..2], &[0xFE, 0xFF]);
        assert_eq!(decode_text_string(&raw), "Zürich");
    }

    #[test]
    fn document_without_form_skips_everything() {
        let pdf = crate::test_support::sample_pdf(&["plain"]);
        let form = FormFill {
            values: values(&[("name", "Ada")]),
            policy: FieldPolicy::BestEffort,
        };
        let filled = fill(&pdf, &form).unwrap();
        assert!(filled.filled.is_empty());
        assert_eq!(filled.skipped, vec!["name"]);
    }

    /// A text field `name` plus a field whose /Kids lists itself twice.
    fn cyclic_form_pdf() -> Vec<u8> {
        use lopdf::Dictionary;

        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        let page_id = doc.add_object(Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut name = Dictionary::new();
        name.set("FT", Object::Name(b"Tx".to_vec()));
        name.set("T", Object::String(b"name".to_vec(), StringFormat::Literal));
        let name_id = doc.add_object(Object::Dictionary(name));

        let loop_id = doc.new_object_id();
        let mut looped = Dictionary::new();
        looped.set("FT", Object::Name(b"Tx".to_vec()));
        looped.set("T", Object::String(b"loop".to_vec(), StringFormat::Literal));
        looped.set(
            "Kids",
            Object::Array(vec![Object::Reference(loop_id), Object::Reference(loop_id)]),
        );
        doc.objects.insert(loop_id, Object::Dictionary(looped));

        let mut acroform = Dictionary::new();
        acroform.set(
            "Fields",
            Object::Array(vec![
                Object::Reference(name_id),
                Object::Reference(loop_id),
                Object::Reference(loop_id),
            ]),
        );
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        catalog.set("AcroForm", Object::Dictionary(acroform));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn self_referencing_kids_are_walked_once() {
        let pdf = cyclic_form_pdf();
        let started = std::time::Instant::now();

        let doc = Document::load_mem(&pdf).unwrap();
        let names: Vec<_> = list_fields(&doc).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["name"]);

        let form = FormFill {
            values: values(&[("name", "Ada"), ("loop", "x")]),
            policy: FieldPolicy::BestEffort,
        };
        let filled = fill(&pdf, &form).unwrap();
        assert_eq!(filled.filled, vec!["name"]);
        assert_eq!(filled.skipped, vec!["loop"]);

        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn filling_sets_need_appearances() {
        let form = FormFill {
            values: values(&[("name", "Ada")]),
            policy: FieldPolicy::BestEffort,
        };
        let filled = fill(&form_pdf(&["name"]), &form).unwrap();
        let doc = Document::load_mem(&filled.bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        let acroform = catalog.get(b"AcroForm").unwrap().as_dict().unwrap();
        assert!(matches!(acroform.get(b"NeedAppearances"), Ok(Object::Boolean(true))));
    }
}
