//! Schema validation for donated objects.
//!
//! Turns a lenient [`ObjectDraft`] into a [`ValidObject`], collecting one
//! message per violated constraint in schema order.

use std::fmt;

use chrono::{DateTime, Utc};

use super::object::{
    Category, Condition, Dimensions, DimensionsDraft, DimensionUnit, DonatedObject, Donor,
    DonorDraft, Location, LocationDraft, ObjectDraft, ValidObject,
};

/// Maximum length of `descricao`, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted wire path of the offending field, e.g. `localizacao.cidade`.
    pub path: &'static str,
    pub message: String,
}

/// All constraint violations found in one candidate object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, path: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            path,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn messages(&self) -> Vec<String> {
        self.iter().map(|e| e.message.clone()).collect()
    }

    #[cfg(test)]
    pub fn has_path(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Trimmed, non-empty string or a required-field error.
fn required(
    value: Option<String>,
    path: &'static str,
    message: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.push(path, message);
            None
        }
    }
}

/// Enumerated value; absent means the default, empty means missing.
fn enumerated<T: Default>(
    value: Option<String>,
    path: &'static str,
    required_message: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &[&str],
    errors: &mut ValidationErrors,
) -> Option<T> {
    let Some(raw) = value else {
        return Some(T::default());
    };
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push(path, required_message);
        return None;
    }
    match parse(raw) {
        Some(v) => Some(v),
        None => {
            errors.push(
                path,
                format!(
                    "'{}' não é um valor válido para {}. Valores permitidos: {}",
                    raw,
                    path,
                    allowed.join(", ")
                ),
            );
            None
        }
    }
}

impl ObjectDraft {
    /// Validate and normalize the draft. `now` is the default donation date.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidObject, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = required(self.name, "nome", "Nome do objeto é obrigatório", &mut errors);
        let category = enumerated(
            self.category,
            "categoria",
            "Categoria é obrigatória",
            Category::from_wire,
            &Category::ALL.map(|c| c.as_str()),
            &mut errors,
        );

        let description = required(
            self.description,
            "descricao",
            "Descrição é obrigatória",
            &mut errors,
        )
        .and_then(|d| {
            if d.chars().count() > MAX_DESCRIPTION_LEN {
                errors.push(
                    "descricao",
                    format!("Descrição não pode ter mais de {MAX_DESCRIPTION_LEN} caracteres"),
                );
                None
            } else {
                Some(d)
            }
        });

        let condition = enumerated(
            self.condition,
            "estado",
            "Estado é obrigatório",
            Condition::from_wire,
            &Condition::ALL.map(|c| c.as_str()),
            &mut errors,
        );

        let location = self.location.unwrap_or_default();
        let city = required(
            location.city,
            "localizacao.cidade",
            "Cidade é obrigatória",
            &mut errors,
        );
        let neighborhood = required(
            location.neighborhood,
            "localizacao.bairro",
            "Bairro é obrigatório",
            &mut errors,
        );

        let donor = self.donor.unwrap_or_default();
        let donor_name = required(
            donor.name,
            "doador.nome",
            "Nome do doador é obrigatório",
            &mut errors,
        );
        let donor_phone = required(
            donor.phone,
            "doador.telefone",
            "Telefone do doador é obrigatório",
            &mut errors,
        );
        let donor_email = required(
            donor.email,
            "doador.email",
            "Email do doador é obrigatório",
            &mut errors,
        )
        .map(|e| e.to_lowercase());

        let dimensions = match self.dimensions {
            None => Some(None),
            Some(d) => enumerated(
                d.unit,
                "dimensoes.unidade",
                "Unidade é obrigatória",
                DimensionUnit::from_wire,
                &DimensionUnit::ALL.map(|u| u.as_str()),
                &mut errors,
            )
            .map(|unit| {
                Some(Dimensions {
                    width: d.width,
                    height: d.height,
                    depth: d.depth,
                    unit,
                })
            }),
        };

        let images = self
            .images
            .unwrap_or_default()
            .into_iter()
            .map(|i| i.trim().to_string())
            .collect();

        match (
            name,
            category,
            description,
            condition,
            city,
            neighborhood,
            donor_name,
            donor_phone,
            donor_email,
            dimensions,
        ) {
            (
                Some(name),
                Some(category),
                Some(description),
                Some(condition),
                Some(city),
                Some(neighborhood),
                Some(donor_name),
                Some(donor_phone),
                Some(donor_email),
                Some(dimensions),
            ) if errors.is_empty() => Ok(ValidObject {
                name,
                category,
                description,
                condition,
                location: Location { city, neighborhood },
                donor: Donor {
                    name: donor_name,
                    phone: donor_phone,
                    email: donor_email,
                },
                available: self.available.unwrap_or(true),
                donation_date: self.donation_date.unwrap_or(now),
                images,
                dimensions,
            }),
            _ => Err(errors),
        }
    }

    /// Apply this draft as a patch over a stored object.
    ///
    /// Top-level fields replace the stored ones; nested objects are merged
    /// field by field.
    pub fn merged_onto(self, base: &DonatedObject) -> ObjectDraft {
        let base = base.to_draft();
        ObjectDraft {
            name: self.name.or(base.name),
            category: self.category.or(base.category),
            description: self.description.or(base.description),
            condition: self.condition.or(base.condition),
            location: merge_nested(self.location, base.location, |p, b| LocationDraft {
                city: p.city.or(b.city),
                neighborhood: p.neighborhood.or(b.neighborhood),
            }),
            donor: merge_nested(self.donor, base.donor, |p, b| DonorDraft {
                name: p.name.or(b.name),
                phone: p.phone.or(b.phone),
                email: p.email.or(b.email),
            }),
            available: self.available.or(base.available),
            donation_date: self.donation_date.or(base.donation_date),
            images: self.images.or(base.images),
            dimensions: merge_nested(self.dimensions, base.dimensions, |p, b| DimensionsDraft {
                width: p.width.or(b.width),
                height: p.height.or(b.height),
                depth: p.depth.or(b.depth),
                unit: p.unit.or(b.unit),
            }),
        }
    }
}

fn merge_nested<T>(patch: Option<T>, base: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (patch, base) {
        (Some(p), Some(b)) => Some(merge(p, b)),
        (p, b) => p.or(b),
    }
}
