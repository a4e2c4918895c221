//! Donated object model.
//!
//! Rust field names are English; the JSON wire names are the Portuguese ones
//! the service's clients already speak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of donated object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[serde(rename = "sofa")]
    Sofa,
    #[serde(rename = "cadeira")]
    Chair,
    #[serde(rename = "armario")]
    Wardrobe,
    #[serde(rename = "geladeira")]
    Refrigerator,
    #[serde(rename = "mesa")]
    Table,
    #[serde(rename = "cama")]
    Bed,
    #[serde(rename = "eletrodomestico")]
    Appliance,
    #[default]
    #[serde(rename = "outros")]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Sofa,
        Category::Chair,
        Category::Wardrobe,
        Category::Refrigerator,
        Category::Table,
        Category::Bed,
        Category::Appliance,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sofa => "sofa",
            Category::Chair => "cadeira",
            Category::Wardrobe => "armario",
            Category::Refrigerator => "geladeira",
            Category::Table => "mesa",
            Category::Bed => "cama",
            Category::Appliance => "eletrodomestico",
            Category::Other => "outros",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Physical condition of a donated object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Condition {
    #[serde(rename = "novo")]
    New,
    #[serde(rename = "seminovo")]
    LikeNew,
    #[default]
    #[serde(rename = "usado")]
    Used,
    #[serde(rename = "precisa_reparo")]
    NeedsRepair,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::New,
        Condition::LikeNew,
        Condition::Used,
        Condition::NeedsRepair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "novo",
            Condition::LikeNew => "seminovo",
            Condition::Used => "usado",
            Condition::NeedsRepair => "precisa_reparo",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Unit the dimensions are expressed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DimensionUnit {
    #[default]
    #[serde(rename = "cm")]
    Centimeters,
    #[serde(rename = "m")]
    Meters,
}

impl DimensionUnit {
    pub const ALL: [DimensionUnit; 2] = [DimensionUnit::Centimeters, DimensionUnit::Meters];

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionUnit::Centimeters => "cm",
            DimensionUnit::Meters => "m",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.as_str() == s)
    }
}

/// Where the object can be picked up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "bairro")]
    pub neighborhood: String,
}

/// Contact details of the person donating the object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donor {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    #[serde(rename = "largura", skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(rename = "altura", skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(rename = "profundidade", skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(rename = "unidade")]
    pub unit: DimensionUnit,
}

/// A stored donated object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonatedObject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "categoria")]
    pub category: Category,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "estado")]
    pub condition: Condition,
    #[serde(rename = "localizacao")]
    pub location: Location,
    #[serde(rename = "doador")]
    pub donor: Donor,
    #[serde(rename = "disponivel")]
    pub available: bool,
    #[serde(rename = "dataDoacao")]
    pub donation_date: DateTime<Utc>,
    #[serde(rename = "imagens")]
    pub images: Vec<String>,
    #[serde(rename = "dimensoes", skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// An object that passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidObject {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub condition: Condition,
    pub location: Location,
    pub donor: Donor,
    pub available: bool,
    pub donation_date: DateTime<Utc>,
    pub images: Vec<String>,
    pub dimensions: Option<Dimensions>,
}

/// Candidate object as sent by clients, on create and on update.
///
/// Every field is optional and enum fields are raw strings, so that a bad
/// value surfaces as a validation message instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectDraft {
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "estado", default)]
    pub condition: Option<String>,
    #[serde(rename = "localizacao", default)]
    pub location: Option<LocationDraft>,
    #[serde(rename = "doador", default)]
    pub donor: Option<DonorDraft>,
    #[serde(rename = "disponivel", default)]
    pub available: Option<bool>,
    #[serde(rename = "dataDoacao", default)]
    pub donation_date: Option<DateTime<Utc>>,
    #[serde(rename = "imagens", default)]
    pub images: Option<Vec<String>>,
    #[serde(rename = "dimensoes", default)]
    pub dimensions: Option<DimensionsDraft>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationDraft {
    #[serde(rename = "cidade", default)]
    pub city: Option<String>,
    #[serde(rename = "bairro", default)]
    pub neighborhood: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonorDraft {
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "telefone", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DimensionsDraft {
    #[serde(rename = "largura", default)]
    pub width: Option<f64>,
    #[serde(rename = "altura", default)]
    pub height: Option<f64>,
    #[serde(rename = "profundidade", default)]
    pub depth: Option<f64>,
    #[serde(rename = "unidade", default)]
    pub unit: Option<String>,
}

impl DonatedObject {
    /// Build the stored form of a validated object.
    pub fn from_valid(id: String, valid: ValidObject, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: valid.name,
            category: valid.category,
            description: valid.description,
            condition: valid.condition,
            location: valid.location,
            donor: valid.donor,
            available: valid.available,
            donation_date: valid.donation_date,
            images: valid.images,
            dimensions: valid.dimensions,
            created_at: now,
            updated_at: now,
        }
    }

    /// The record's user-editable fields as a draft, used as the base of an update.
    pub fn to_draft(&self) -> ObjectDraft {
        ObjectDraft {
            name: Some(self.name.clone()),
            category: Some(self.category.as_str().to_string()),
            description: Some(self.description.clone()),
            condition: Some(self.condition.as_str().to_string()),
            location: Some(LocationDraft {
                city: Some(self.location.city.clone()),
                neighborhood: Some(self.location.neighborhood.clone()),
            }),
            donor: Some(DonorDraft {
                name: Some(self.donor.name.clone()),
                phone: Some(self.donor.phone.clone()),
                email: Some(self.donor.email.clone()),
            }),
            available: Some(self.available),
            donation_date: Some(self.donation_date),
            images: Some(self.images.clone()),
            dimensions: self.dimensions.as_ref().map(|d| DimensionsDraft {
                width: d.width,
                height: d.height,
                depth: d.depth,
                unit: Some(d.unit.as_str().to_string()),
            }),
        }
    }
}

/// Per-group count produced by the statistics aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub key: String,
    pub count: i64,
}

/// Aggregate statistics over the whole collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatistics {
    pub total: i64,
    pub disponiveis: i64,
    pub por_categoria: Vec<GroupCount>,
    pub por_cidade: Vec<GroupCount>,
}
