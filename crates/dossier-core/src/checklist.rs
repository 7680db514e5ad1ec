//! # Document Checklist
//!
//! Static mapping from [`ProductType`] to the document types an exporter
//! must (or may) provide for a product. The checklist is configuration, not
//! per-case state.
//!
//! The food checklist has one conditional entry: [`DocumentType::BrandLicense`]
//! is a required slot when the product declares `has_brand_license`, and is
//! not a slot at all otherwise. [`required_slots`] and [`legal_slots`]
//! evaluate the product's current flags on every call.

use serde::{Deserialize, Serialize};

use crate::error::DossierError;
use crate::product::{Product, ProductType};

/// Document type tag. One variant per checklist entry across all product types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Sanitary approval of the production facility.
    SanitaryApproval,
    /// Sanitary certificate.
    SanitaryCert,
    /// Certificate of free sale.
    FreeSaleCert,
    /// Technical data sheet.
    TechnicalDataSheet,
    /// Bacteriological analysis report.
    BacterioAnalysis,
    /// Physico-chemical analysis report.
    PhysicoChemAnalysis,
    /// Radioactivity analysis report.
    RadioactivityAnalysis,
    /// Fumigation certificate.
    FumigationCert,
    /// Official request letter.
    OfficialLetter,
    /// Quality management certificate.
    QualityCert,
    /// Storage facility plan.
    StorageFacilityPlan,
    /// Production facility plan.
    ProductionFacilityPlan,
    /// Self-monitoring plan.
    MonitoringPlan,
    /// Brand license agreement (conditional).
    BrandLicense,
    /// Product sheets.
    ProductSheets,
    /// Product labels.
    ProductLabels,
    /// Commission letter.
    CommissionLetter,
    /// Certificate of conformity or analysis report (industrial products).
    ConformityCertAnalysisReport,
}

impl DocumentType {
    /// Every document type, in declaration order.
    pub const ALL: [DocumentType; 18] = [
        Self::SanitaryApproval,
        Self::SanitaryCert,
        Self::FreeSaleCert,
        Self::TechnicalDataSheet,
        Self::BacterioAnalysis,
        Self::PhysicoChemAnalysis,
        Self::RadioactivityAnalysis,
        Self::FumigationCert,
        Self::OfficialLetter,
        Self::QualityCert,
        Self::StorageFacilityPlan,
        Self::ProductionFacilityPlan,
        Self::MonitoringPlan,
        Self::BrandLicense,
        Self::ProductSheets,
        Self::ProductLabels,
        Self::CommissionLetter,
        Self::ConformityCertAnalysisReport,
    ];

    /// Wire name of the document type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SanitaryApproval => "SANITARY_APPROVAL",
            Self::SanitaryCert => "SANITARY_CERT",
            Self::FreeSaleCert => "FREE_SALE_CERT",
            Self::TechnicalDataSheet => "TECHNICAL_DATA_SHEET",
            Self::BacterioAnalysis => "BACTERIO_ANALYSIS",
            Self::PhysicoChemAnalysis => "PHYSICO_CHEM_ANALYSIS",
            Self::RadioactivityAnalysis => "RADIOACTIVITY_ANALYSIS",
            Self::FumigationCert => "FUMIGATION_CERT",
            Self::OfficialLetter => "OFFICIAL_LETTER",
            Self::QualityCert => "QUALITY_CERT",
            Self::StorageFacilityPlan => "STORAGE_FACILITY_PLAN",
            Self::ProductionFacilityPlan => "PRODUCTION_FACILITY_PLAN",
            Self::MonitoringPlan => "MONITORING_PLAN",
            Self::BrandLicense => "BRAND_LICENSE",
            Self::ProductSheets => "PRODUCT_SHEETS",
            Self::ProductLabels => "PRODUCT_LABELS",
            Self::CommissionLetter => "COMMISSION_LETTER",
            Self::ConformityCertAnalysisReport => "CONFORMITY_CERT_ANALYSIS_REPORT",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DossierError::Validation(format!("unknown document type \"{s}\"")))
    }
}

/// Whether a checklist entry applies unconditionally or only to branded products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applicability {
    Always,
    BrandLicensed,
}

/// One line of a product-type checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistEntry {
    /// Document type tag.
    pub document_type: DocumentType,
    /// Human-readable label shown to the exporter.
    pub label: &'static str,
    /// Whether the slot must be filled before submission.
    pub required: bool,
    #[serde(skip)]
    applies: Applicability,
}

impl ChecklistEntry {
    const fn always(document_type: DocumentType, label: &'static str, required: bool) -> Self {
        Self {
            document_type,
            label,
            required,
            applies: Applicability::Always,
        }
    }

    const fn when_brand_licensed(document_type: DocumentType, label: &'static str) -> Self {
        Self {
            document_type,
            label,
            required: true,
            applies: Applicability::BrandLicensed,
        }
    }

    /// Whether this entry is part of the checklist for the given brand flag.
    pub fn applies_to(&self, has_brand_license: bool) -> bool {
        match self.applies {
            Applicability::Always => true,
            Applicability::BrandLicensed => has_brand_license,
        }
    }
}

const FOOD_CHECKLIST: &[ChecklistEntry] = &[
    ChecklistEntry::always(DocumentType::SanitaryApproval, "Sanitary approval of the production facility", true),
    ChecklistEntry::always(DocumentType::SanitaryCert, "Sanitary certificate", true),
    ChecklistEntry::always(DocumentType::FreeSaleCert, "Certificate of free sale", true),
    ChecklistEntry::always(DocumentType::TechnicalDataSheet, "Technical data sheet", true),
    ChecklistEntry::always(DocumentType::BacterioAnalysis, "Bacteriological analysis report", true),
    ChecklistEntry::always(DocumentType::PhysicoChemAnalysis, "Physico-chemical analysis report", true),
    ChecklistEntry::always(DocumentType::RadioactivityAnalysis, "Radioactivity analysis report", true),
    ChecklistEntry::always(DocumentType::FumigationCert, "Fumigation certificate", true),
    ChecklistEntry::always(DocumentType::OfficialLetter, "Official request letter", true),
    ChecklistEntry::always(DocumentType::QualityCert, "Quality management certificate", false),
    ChecklistEntry::always(DocumentType::StorageFacilityPlan, "Storage facility plan", false),
    ChecklistEntry::always(DocumentType::ProductionFacilityPlan, "Production facility plan", false),
    ChecklistEntry::always(DocumentType::MonitoringPlan, "Self-monitoring plan", false),
    ChecklistEntry::when_brand_licensed(DocumentType::BrandLicense, "Brand license agreement"),
    ChecklistEntry::always(DocumentType::ProductSheets, "Product sheets", true),
    ChecklistEntry::always(DocumentType::ProductLabels, "Product labels", false),
    ChecklistEntry::always(DocumentType::CommissionLetter, "Commission letter", false),
];

const INDUSTRIAL_CHECKLIST: &[ChecklistEntry] = &[ChecklistEntry::always(
    DocumentType::ConformityCertAnalysisReport,
    "Certificate of conformity or analysis report",
    true,
)];

/// The full static checklist for a product type, conditional entries included.
pub fn checklist_for(product_type: ProductType) -> &'static [ChecklistEntry] {
    match product_type {
        ProductType::Food => FOOD_CHECKLIST,
        ProductType::Industrial => INDUSTRIAL_CHECKLIST,
    }
}

/// Checklist entries applicable to a product type under the given brand flag.
pub fn evaluate_checklist(
    product_type: ProductType,
    has_brand_license: bool,
) -> impl Iterator<Item = &'static ChecklistEntry> {
    checklist_for(product_type)
        .iter()
        .filter(move |e| e.applies_to(has_brand_license))
}

/// Every slot the product accepts, optional ones included.
pub fn legal_slots(product: &Product) -> Vec<&'static ChecklistEntry> {
    evaluate_checklist(product.product_type, product.has_brand_license).collect()
}

/// Required document types for the product, in checklist order.
pub fn required_slots(product: &Product) -> Vec<DocumentType> {
    evaluate_checklist(product.product_type, product.has_brand_license)
        .filter(|e| e.required)
        .map(|e| e.document_type)
        .collect()
}

/// Whether `document_type` is a slot the product accepts.
pub fn is_legal_slot(product: &Product, document_type: DocumentType) -> bool {
    evaluate_checklist(product.product_type, product.has_brand_license)
        .any(|e| e.document_type == document_type)
}

/// Label of a document type, looked up across all checklists.
pub fn label_of(document_type: DocumentType) -> &'static str {
    FOOD_CHECKLIST
        .iter()
        .chain(INDUSTRIAL_CHECKLIST)
        .find(|e| e.document_type == document_type)
        .map(|e| e.label)
        .unwrap_or_else(|| document_type.as_str())
}
