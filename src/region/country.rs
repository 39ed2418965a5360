//! Static region-variant to ISO country-code lookup.
//!
//! Country-scoped source clients need a 2-letter code, but users type cities,
//! aliases, and hashtag-able forms. The table maps many variants to one code;
//! lookup is case-insensitive substring match preferring the longest key, so
//! "new york city" beats "york" and "united states of america" beats "america".

/// Variant → ISO 3166-1 alpha-2 code. Lowercase keys only.
const COUNTRY_VARIANTS: &[(&str, &str)] = &[
    // United States
    ("united states of america", "us"),
    ("united states", "us"),
    ("america", "us"),
    ("usa", "us"),
    ("new york", "us"),
    ("los angeles", "us"),
    ("chicago", "us"),
    ("san francisco", "us"),
    ("washington", "us"),
    // United Kingdom
    ("united kingdom", "gb"),
    ("great britain", "gb"),
    ("britain", "gb"),
    ("england", "gb"),
    ("scotland", "gb"),
    ("london", "gb"),
    ("manchester", "gb"),
    ("uk", "gb"),
    // France
    ("france", "fr"),
    ("paris", "fr"),
    ("marseille", "fr"),
    ("lyon", "fr"),
    // Germany
    ("germany", "de"),
    ("deutschland", "de"),
    ("berlin", "de"),
    ("munich", "de"),
    ("hamburg", "de"),
    // Japan
    ("japan", "jp"),
    ("tokyo", "jp"),
    ("osaka", "jp"),
    ("kyoto", "jp"),
    // India
    ("india", "in"),
    ("mumbai", "in"),
    ("delhi", "in"),
    ("bangalore", "in"),
    ("bengaluru", "in"),
    // Brazil
    ("brazil", "br"),
    ("brasil", "br"),
    ("rio de janeiro", "br"),
    ("sao paulo", "br"),
    ("são paulo", "br"),
    // Australia
    ("australia", "au"),
    ("sydney", "au"),
    ("melbourne", "au"),
    // Canada
    ("canada", "ca"),
    ("toronto", "ca"),
    ("vancouver", "ca"),
    ("montreal", "ca"),
    // Others
    ("mexico", "mx"),
    ("mexico city", "mx"),
    ("spain", "es"),
    ("madrid", "es"),
    ("barcelona", "es"),
    ("italy", "it"),
    ("rome", "it"),
    ("milan", "it"),
    ("china", "cn"),
    ("beijing", "cn"),
    ("shanghai", "cn"),
    ("russia", "ru"),
    ("moscow", "ru"),
    ("south korea", "kr"),
    ("seoul", "kr"),
    ("netherlands", "nl"),
    ("amsterdam", "nl"),
    ("nigeria", "ng"),
    ("lagos", "ng"),
    ("south africa", "za"),
    ("johannesburg", "za"),
    ("cape town", "za"),
    ("egypt", "eg"),
    ("cairo", "eg"),
    ("argentina", "ar"),
    ("buenos aires", "ar"),
    ("ukraine", "ua"),
    ("kyiv", "ua"),
    ("israel", "il"),
    ("tel aviv", "il"),
    ("turkey", "tr"),
    ("istanbul", "tr"),
    ("indonesia", "id"),
    ("jakarta", "id"),
];

/// Country display names used when folding a code back into query text.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("us", "united states"),
    ("gb", "united kingdom"),
    ("fr", "france"),
    ("de", "germany"),
    ("jp", "japan"),
    ("in", "india"),
    ("br", "brazil"),
    ("au", "australia"),
    ("ca", "canada"),
    ("mx", "mexico"),
    ("es", "spain"),
    ("it", "italy"),
    ("cn", "china"),
    ("ru", "russia"),
    ("kr", "south korea"),
    ("nl", "netherlands"),
    ("ng", "nigeria"),
    ("za", "south africa"),
    ("eg", "egypt"),
    ("ar", "argentina"),
    ("ua", "ukraine"),
    ("il", "israel"),
    ("tr", "turkey"),
    ("id", "indonesia"),
];

/// Resolve a free-text region to a 2-letter country code.
///
/// Picks the longest known variant contained in the query; defaults to `"us"`
/// when nothing matches.
#[must_use]
pub fn country_code_for(region_query: &str) -> &'static str {
    let query = region_query.trim().to_lowercase();
    if query.is_empty() {
        return "us";
    }

    let mut best: Option<(&str, &str)> = None;
    for (variant, code) in COUNTRY_VARIANTS {
        if query.contains(variant) {
            match best {
                Some((current, _)) if current.len() >= variant.len() => {}
                _ => best = Some((variant, code)),
            }
        }
    }

    best.map_or("us", |(_, code)| code)
}

/// Display name for a country code, if known.
#[must_use]
pub fn country_name_for_code(code: &str) -> Option<&'static str> {
    let code = code.to_lowercase();
    COUNTRY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Known textual aliases for a country name, used by the GDELT secondary
/// filter ("USA" and "America" both count as mentions of the United States).
#[must_use]
pub fn country_aliases(country_name: &str) -> Vec<&'static str> {
    let lower = country_name.trim().to_lowercase();
    let Some(code) = COUNTRY_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == lower)
        .map(|(_, code)| *code)
    else {
        return Vec::new();
    };

    COUNTRY_VARIANTS
        .iter()
        .filter(|(variant, c)| *c == code && *variant != lower)
        .map(|(variant, _)| *variant)
        .collect()
}
