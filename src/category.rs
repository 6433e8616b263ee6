use anyhow::{bail, Result};

/// Base address of the MyGAP/MyOrganic search site. Relative follow-up
/// links (`fulltext.php?...`) are resolved against this.
pub const BASE_URL: &str = "https://carianmygapmyorganic.doa.gov.my/";

/// One certification category: its listing endpoint and the ordered field
/// schema that drives column resolution and output column order.
///
/// Configs are immutable statics handed into the pipeline per run; nothing
/// here is mutated between runs, so categories can be extracted side by side
/// in the same process.
#[derive(Debug)]
pub struct CategoryConfig {
    /// Short name used on the CLI and in artifact file names.
    pub name: &'static str,
    /// Human-readable label for log lines.
    pub label: &'static str,
    /// Listing page, relative to [`BASE_URL`].
    pub list_path: &'static str,
    /// Ordered field identifiers, matched against `data-field` attributes.
    pub fields: &'static [&'static str],
}

const TANAMAN_FIELDS: &[&str] = &[
    "no_pensijilan",     // Certification Number
    "projek",            // Applicant Category
    "nama",              // Name
    "negeri",            // State
    "daerah",            // District
    "jenis_tanaman",     // Plant Type
    "kategori_komoditi", // Commodity Category
    "kategori_tanaman",  // Plant Category
    "luas_ladang",       // Farm Area (Ha)
    "tahun_pensijilan",  // Certification Year
    "tarikh_pensijilan", // Certification Date
    "tempoh_sah_laku",   // Expiry Date
];

const AM_FIELDS: &[&str] = &[
    "no_pensijilan",
    "kategori_pemohon", // Applicant Category (keyed differently from tanaman)
    "nama",
    "negeri",
    "daerah",
    "jenis_tanaman",
    "kategori_komoditi",
    "kategori_tanaman",
    "luas_ladang",
    "tahun_pensijilan",
    "tarikh_pensijilan",
    "tempoh_sah_laku",
];

const ORGANIC_FIELDS: &[&str] = &[
    "no_pensijilan",
    "kategori_pemohon",
    "nama",
    "negeri",
    "daerah",
    "jenis_tanaman",
    "kategori_komoditi",
    "luas_ladang",
    "tahun_pensijilan",
    "tarikh_pensijilan",
    "tempoh_sah_laku",
];

pub const CATEGORIES: &[CategoryConfig] = &[
    CategoryConfig {
        name: "pf",
        label: "MyGAP Plant & Fresh",
        list_path: "mygap_pf_list.php",
        fields: TANAMAN_FIELDS,
    },
    CategoryConfig {
        name: "am",
        label: "MyGAP Apiary Management",
        list_path: "mygap_am_list.php",
        fields: AM_FIELDS,
    },
    CategoryConfig {
        name: "tanaman",
        label: "MyGAP Tanaman",
        list_path: "mygap_tanaman_list.php",
        fields: TANAMAN_FIELDS,
    },
    CategoryConfig {
        name: "organic",
        label: "MyOrganic",
        list_path: "myorganic_list.php",
        fields: ORGANIC_FIELDS,
    },
];

impl CategoryConfig {
    /// Resolve a CLI category name to its config.
    pub fn parse(name: &str) -> Result<&'static CategoryConfig> {
        let wanted = name.trim().to_ascii_lowercase();
        match CATEGORIES.iter().find(|c| c.name == wanted) {
            Some(cfg) => Ok(cfg),
            None => {
                let known: Vec<&str> = CATEGORIES.iter().map(|c| c.name).collect();
                bail!("unknown category '{}' (known: {})", name, known.join(", "))
            }
        }
    }

    /// Full listing URL. `pagesize=-1` asks the site for the whole table in
    /// one response, so no pagination loop is needed.
    pub fn list_url(&self) -> String {
        format!("{}{}?pagesize=-1", BASE_URL, self.list_path)
    }

    /// Position of a field identifier within this schema.
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_categories() {
        for name in ["pf", "am", "tanaman", "organic"] {
            let cfg = CategoryConfig::parse(name).unwrap();
            assert_eq!(cfg.name, name);
            assert!(!cfg.fields.is_empty());
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        let cfg = CategoryConfig::parse(" Tanaman ").unwrap();
        assert_eq!(cfg.name, "tanaman");
    }

    #[test]
    fn parse_unknown_category_fails() {
        let err = CategoryConfig::parse("ternakan").unwrap_err();
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn schemas_anchor_on_certification_number() {
        for cfg in CATEGORIES {
            assert_eq!(cfg.fields[0], "no_pensijilan", "{}", cfg.name);
        }
    }

    #[test]
    fn schemas_have_unique_fields() {
        for cfg in CATEGORIES {
            let mut seen = std::collections::HashSet::new();
            for f in cfg.fields {
                assert!(seen.insert(f), "{} duplicates {}", cfg.name, f);
            }
        }
    }

    #[test]
    fn field_index_follows_schema_order() {
        let cfg = CategoryConfig::parse("tanaman").unwrap();
        assert_eq!(cfg.field_index("no_pensijilan"), Some(0));
        assert_eq!(cfg.field_index("projek"), Some(1));
        assert_eq!(cfg.field_index("kategori_pemohon"), None);
    }

    #[test]
    fn list_url_disables_pagination() {
        let cfg = CategoryConfig::parse("pf").unwrap();
        assert_eq!(
            cfg.list_url(),
            "https://carianmygapmyorganic.doa.gov.my/mygap_pf_list.php?pagesize=-1"
        );
    }
}
