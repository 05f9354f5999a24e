/// Brands reported on individually. Everything else rolls up under [`UNCLASSIFIED`].
pub const NAMED_BRANDS: [&str; 6] = ["Birkenstock", "Rieker", "Lunar", "Crocs", "Hotter", "Skechers"];

pub const UNCLASSIFIED: &str = "UKD";
pub const ALL: &str = "All";

pub fn is_named(brand: Option<&str>) -> bool {
    brand.is_some_and(|brand| {
        let brand = brand.trim();
        NAMED_BRANDS
            .iter()
            .any(|named| named.eq_ignore_ascii_case(brand))
    })
}

/// Lowercased allow-list for `<> ALL($n)` predicates.
pub fn named_brands_lowercase() -> Vec<String> {
    NAMED_BRANDS.iter().map(|brand| brand.to_lowercase()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BrandFilter {
    #[default]
    All,
    Unclassified,
    Exact(String),
}

impl BrandFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => BrandFilter::All,
            Some(value) if value.eq_ignore_ascii_case(ALL) => BrandFilter::All,
            Some(value) if value.eq_ignore_ascii_case(UNCLASSIFIED) => BrandFilter::Unclassified,
            Some(value) => BrandFilter::Exact(value.to_string()),
        }
    }

    pub fn matches(&self, brand: Option<&str>) -> bool {
        match self {
            BrandFilter::All => true,
            BrandFilter::Unclassified => !is_named(brand),
            BrandFilter::Exact(wanted) => {
                brand.is_some_and(|brand| brand.trim().eq_ignore_ascii_case(wanted))
            }
        }
    }
}

/// Dropdown options: `All`, every named brand present in `brands`, and the
/// catch-all when at least one brand falls outside the allow-list.
pub fn brand_options<'a, I>(brands: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut present = [false; NAMED_BRANDS.len()];
    let mut has_unclassified = false;

    for brand in brands {
        let position = brand.and_then(|brand| {
            let brand = brand.trim();
            NAMED_BRANDS
                .iter()
                .position(|named| named.eq_ignore_ascii_case(brand))
        });

        match position {
            Some(index) => present[index] = true,
            None => has_unclassified = true,
        }
    }

    let mut options = vec![ALL.to_string()];
    options.extend(
        NAMED_BRANDS
            .iter()
            .zip(present)
            .filter(|(_, present)| *present)
            .map(|(brand, _)| brand.to_string()),
    );

    if has_unclassified {
        options.push(UNCLASSIFIED.to_string());
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclassified_filter_excludes_named_brands() {
        let filter = BrandFilter::parse(Some("UKD"));
        assert_eq!(filter, BrandFilter::Unclassified);
        assert!(filter.matches(Some("Nike")));
        assert!(!filter.matches(Some("Rieker")));
        assert!(!filter.matches(Some("rieker")));
        assert!(filter.matches(None));
        assert!(filter.matches(Some("")));
    }

    #[test]
    fn parse_treats_blank_and_all_as_no_filter() {
        assert_eq!(BrandFilter::parse(None), BrandFilter::All);
        assert_eq!(BrandFilter::parse(Some("  ")), BrandFilter::All);
        assert_eq!(BrandFilter::parse(Some("all")), BrandFilter::All);
        assert_eq!(BrandFilter::parse(Some("ukd")), BrandFilter::Unclassified);
    }

    #[test]
    fn exact_filter_is_case_insensitive() {
        let filter = BrandFilter::parse(Some("crocs"));
        assert!(filter.matches(Some("Crocs")));
        assert!(!filter.matches(Some("Hotter")));
        assert!(!filter.matches(None));
    }

    #[test]
    fn options_only_list_present_brands() {
        let options = brand_options([Some("SKECHERS"), Some("Rieker"), Some("rieker")]);
        assert_eq!(options, vec!["All", "Rieker", "Skechers"]);
    }

    #[test]
    fn options_add_catch_all_for_unlisted_or_missing_brands() {
        let options = brand_options([Some("Lunar"), None]);
        assert_eq!(options, vec!["All", "Lunar", "UKD"]);

        let options = brand_options([Some("Nike")]);
        assert_eq!(options, vec!["All", "UKD"]);

        let options = brand_options(std::iter::empty());
        assert_eq!(options, vec!["All"]);
    }
}
