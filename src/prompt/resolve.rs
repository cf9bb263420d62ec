//! Answer selection. Pure functions over parsed tables.

use crate::config::{BuildType, Nesting};
use crate::error::{BuildError, Result};

use super::parse::{NestingOptionTable, PlatformOptionTable};

/// Outcome of resolving the platform menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformChoice<'a> {
    pub label: &'a str,
    pub index: &'a str,
    /// Labels that mentioned the compiler pair. More than one is ambiguous.
    pub candidates: usize,
}

impl PlatformChoice<'_> {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Pick the menu index for `build_type` under the label naming `compiler_pair`.
///
/// Several labels commonly mention the same pair (`GNU (gfortran/gcc)` and
/// `GNU (gfortran/gcc): Aarch64`); the shortest one is taken, first listed on
/// a tie.
pub fn resolve_platform<'a>(
    table: &'a PlatformOptionTable,
    compiler_pair: &str,
    build_type: BuildType,
) -> Result<PlatformChoice<'a>> {
    let needle = compiler_pair.to_ascii_lowercase();
    let matches = table
        .entries()
        .iter()
        .filter(|entry| entry.label.to_ascii_lowercase().contains(&needle))
        .collect::<Vec<_>>();

    let Some(selected) = matches
        .iter()
        .copied()
        .reduce(|best, entry| {
            if entry.label.len() < best.label.len() {
                entry
            } else {
                best
            }
        })
    else {
        return Err(BuildError::Configuration(format!(
            "no build option found for {} compilers",
            compiler_pair
        )));
    };

    let index = selected.index_for(build_type).ok_or_else(|| {
        BuildError::Configuration(format!(
            "build_type {} unsupported for {} compilers (option '{}')",
            build_type, compiler_pair, selected.label
        ))
    })?;

    Ok(PlatformChoice {
        label: &selected.label,
        index,
        candidates: matches.len(),
    })
}

/// Pick the menu index for `nesting`.
pub fn resolve_nesting(table: &NestingOptionTable, nesting: Nesting) -> Result<&str> {
    table.index_for(nesting).ok_or_else(|| {
        let offered = table
            .options()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        BuildError::Configuration(format!(
            "nesting {} not offered by configure (offered: {})",
            nesting, offered
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::parse::{parse_nesting_options, parse_platform_options};

    fn table_with(rows: &[(&str, BuildType, &str)]) -> PlatformOptionTable {
        let mut table = PlatformOptionTable::new();
        for (label, mode, index) in rows {
            table.insert(label, *mode, index);
        }
        table
    }

    #[test]
    fn shortest_matching_label_wins() {
        let long = "GNU (gfortran/gcc): Aarch64 w/ SVE";
        let short = "GNU (gfortran/gcc) plain";
        assert_eq!(long.len(), 34);
        assert_eq!(short.len(), 24);

        let table = table_with(&[
            (long, BuildType::Dmpar, "7"),
            (short, BuildType::Dmpar, "34"),
        ]);

        for _ in 0..3 {
            let choice = resolve_platform(&table, "gfortran/gcc", BuildType::Dmpar).unwrap();
            assert_eq!(choice.label, short);
            assert_eq!(choice.index, "34");
            assert!(choice.is_ambiguous());
        }
    }

    #[test]
    fn equal_length_tie_keeps_first_listed() {
        let table = table_with(&[
            ("A (gfortran/gcc)", BuildType::Serial, "1"),
            ("B (gfortran/gcc)", BuildType::Serial, "2"),
        ]);
        let choice = resolve_platform(&table, "gfortran/gcc", BuildType::Serial).unwrap();
        assert_eq!(choice.index, "1");
    }

    #[test]
    fn match_is_case_insensitive() {
        let table = table_with(&[("INTEL (IFORT/ICC)", BuildType::Smpar, "14")]);
        let choice = resolve_platform(&table, "ifort/icc", BuildType::Smpar).unwrap();
        assert_eq!(choice.index, "14");
        assert!(!choice.is_ambiguous());
    }

    #[test]
    fn unknown_compiler_pair_is_a_configuration_error() {
        let table = table_with(&[("GNU (gfortran/gcc)", BuildType::Dmpar, "34")]);
        let result = resolve_platform(&table, "ifort/icc", BuildType::Dmpar);
        assert!(matches!(result, Err(BuildError::Configuration(_))));
    }

    #[test]
    fn missing_mode_names_the_combination() {
        let table = table_with(&[("GNU (gfortran/gcc)", BuildType::Serial, "32")]);
        match resolve_platform(&table, "gfortran/gcc", BuildType::DmSm) {
            Err(BuildError::Configuration(detail)) => {
                assert!(detail.contains("dm+sm"));
                assert!(detail.contains("gfortran/gcc"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn resolves_against_parsed_transcript() {
        let menu = "\
Please select from among the following Linux x86_64 options:
 32. (serial)  33. (smpar)  34. (dmpar)  35. (dm+sm)   GNU (gfortran/gcc)
 36. (serial)  37. (smpar)  38. (dmpar)  39. (dm+sm)   GNU (gfortran/gcc): Aarch64
Enter selection [1-75] : ";
        let table = parse_platform_options(menu).unwrap();
        let choice = resolve_platform(&table, "gfortran/gcc", BuildType::Dmpar).unwrap();
        assert_eq!(choice.label, "GNU (gfortran/gcc)");
        assert_eq!(choice.index, "34");
        assert_eq!(choice.candidates, 2);
    }

    #[test]
    fn nesting_lookup() {
        let table = parse_nesting_options("(1=basic, 2=preset moves, 3=vortex following)").unwrap();
        assert_eq!(resolve_nesting(&table, Nesting::PresetMoves).unwrap(), "2");

        match resolve_nesting(&table, Nesting::NoNesting) {
            Err(BuildError::Configuration(detail)) => {
                assert!(detail.contains("no_nesting"));
                assert!(detail.contains("vortex_following"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
