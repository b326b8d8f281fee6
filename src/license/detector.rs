use std::path::{Path, PathBuf};

use crate::error::{AuditError, AuditResult};
use crate::models::{LicenseInfo, Lookup};

/// A license found in a directory, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLicense {
    pub license_type: String,
    /// Path to the evidence file as the provider reported it.
    pub file: PathBuf,
}

pub trait LicenseProvider: Send + Sync {
    fn detect(&self, dir: &Path) -> AuditResult<DetectedLicense>;
}

/// Detect the license in `dir`. Never fails: any error becomes
/// [`Lookup::Unavailable`], and the evidence file is reduced to its base name.
pub fn detect_license(provider: &dyn LicenseProvider, dir: &Path) -> Lookup<LicenseInfo> {
    match provider.detect(dir) {
        Ok(found) => {
            let file = found
                .file
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            Lookup::Found(LicenseInfo {
                license_type: found.license_type,
                file,
            })
        }
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no license detected");
            Lookup::unavailable(e)
        }
    }
}

/// File names checked, in priority order (case-insensitive).
const LICENSE_FILES: &[&str] = &[
    "license",
    "license.txt",
    "license.md",
    "licence",
    "licence.txt",
    "licence.md",
    "copying",
    "copying.txt",
    "copying.md",
    "unlicense",
    "license-mit",
    "license.mit",
    "license-apache",
];

/// Reads well-known license files from disk and guesses their type.
#[derive(Debug, Default)]
pub struct FsLicenseDetector;

impl FsLicenseDetector {
    pub fn new() -> Self {
        Self
    }

    fn find_license_file(&self, dir: &Path) -> AuditResult<PathBuf> {
        let mut candidates: Vec<(usize, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if let Some(rank) = LICENSE_FILES.iter().position(|f| *f == name) {
                candidates.push((rank, entry.path()));
            }
        }
        candidates
            .into_iter()
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, path)| path)
            .ok_or_else(|| AuditError::LicenseNotFound(dir.to_path_buf()))
    }
}

impl LicenseProvider for FsLicenseDetector {
    fn detect(&self, dir: &Path) -> AuditResult<DetectedLicense> {
        let file = self.find_license_file(dir)?;
        let text = std::fs::read_to_string(&file)?;
        let license_type =
            guess_type(&text).ok_or_else(|| AuditError::LicenseUnrecognized(file.clone()))?;
        Ok(DetectedLicense {
            license_type: license_type.to_string(),
            file,
        })
    }
}

/// Copyleft and Apache texts quote one another in their bodies (GPL-3.0
/// points at the AGPL, MPL-2.0 lists the GNU licenses as secondary), so
/// these families are identified from the first title near the top of the
/// file rather than from phrases anywhere in it.
const HEADER_CHARS: usize = 1024;
/// How far past a title its version number may appear.
const VERSION_WINDOW: usize = 80;

#[derive(Debug, Clone, Copy)]
enum Family {
    Agpl,
    Lgpl,
    LibraryGpl,
    Gpl,
    Mpl,
    Epl,
    Apache,
}

const TITLES: &[(&str, Family)] = &[
    ("gnu affero general public license", Family::Agpl),
    ("gnu lesser general public license", Family::Lgpl),
    ("gnu library general public license", Family::LibraryGpl),
    ("gnu general public license", Family::Gpl),
    ("mozilla public license", Family::Mpl),
    ("eclipse public license", Family::Epl),
    ("apache license", Family::Apache),
];

/// Guess the SPDX identifier of a license text.
///
/// Titled licenses are matched on their header first; the permissive
/// families without a title are then matched on signature phrases. Text
/// that only asserts "all rights reserved" is reported as `Proprietary`.
pub fn guess_type(text: &str) -> Option<&'static str> {
    let t = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(id) = identify_by_title(&t) {
        return Some(id);
    }

    let has = |phrase: &str| t.contains(phrase);

    if has("this is free and unencumbered software released into the public domain") {
        return Some("Unlicense");
    }
    if has("cc0 1.0 universal") {
        return Some("CC0-1.0");
    }
    if has("permission to use, copy, modify, and/or distribute this software for any purpose")
        || has("permission to use, copy, modify, and distribute this software for any purpose with or without fee")
    {
        return Some("ISC");
    }
    if has("permission is hereby granted, free of charge, to any person obtaining a copy") {
        return Some("MIT");
    }
    if has("redistribution and use in source and binary forms") {
        if has("all advertising materials mentioning features") {
            return Some("BSD-4-Clause");
        }
        if has("neither the name") || has("names of its contributors may be used") {
            return Some("BSD-3-Clause");
        }
        return Some("BSD-2-Clause");
    }
    if has("all rights reserved") {
        return Some("Proprietary");
    }
    None
}

/// `t` is the normalized text. The earliest title in the header wins.
fn identify_by_title(t: &str) -> Option<&'static str> {
    let header = take_chars(t, HEADER_CHARS);
    let (pos, title, family) = TITLES
        .iter()
        .filter_map(|(title, family)| header.find(title).map(|pos| (pos, *title, *family)))
        .min_by_key(|(pos, _, _)| *pos)?;

    let version = version_digit(take_chars(&t[pos + title.len()..], VERSION_WINDOW));

    match (family, version) {
        (Family::Agpl, _) => Some("AGPL-3.0"),
        (Family::Lgpl, Some('3')) => Some("LGPL-3.0"),
        (Family::Lgpl, _) => Some("LGPL-2.1"),
        (Family::LibraryGpl, _) => Some("LGPL-2.0"),
        (Family::Gpl, Some('3')) => Some("GPL-3.0"),
        (Family::Gpl, Some('1')) => Some("GPL-1.0"),
        (Family::Gpl, _) => Some("GPL-2.0"),
        (Family::Mpl, Some('2')) => Some("MPL-2.0"),
        (Family::Mpl, Some('1')) => Some("MPL-1.1"),
        (Family::Epl, Some('2')) => Some("EPL-2.0"),
        (Family::Epl, Some('1')) => Some("EPL-1.0"),
        (Family::Apache, Some('2')) => Some("Apache-2.0"),
        _ => None,
    }
}

/// Major version from `version 2.0`, `v 2.0` or `v2.0` style wording.
fn version_digit(window: &str) -> Option<char> {
    let words: Vec<&str> = window
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();

    for (i, word) in words.iter().enumerate() {
        let rest = match *word {
            "version" | "v" | "v." => words.get(i + 1).copied().unwrap_or(""),
            w if w.starts_with('v') => &w[1..],
            _ => continue,
        };
        if let Some(d) = rest.chars().next().filter(char::is_ascii_digit) {
            return Some(d);
        }
    }
    None
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIT: &str = "The MIT License (MIT)\n\nCopyright (c) 2015 Someone\n\n\
        Permission is hereby granted, free of charge, to any person obtaining a copy\n\
        of this software and associated documentation files (the \"Software\"), to deal";

    const BSD3: &str = "Copyright (c) 2009 The Go Authors. All rights reserved.\n\n\
        Redistribution and use in source and binary forms, with or without\n\
        modification, are permitted provided that the following conditions are\n\
        met:\n ... Neither the name of Google Inc. nor the names of its\n\
        contributors may be used to endorse or promote products";

    #[test]
    fn test_guess_common_types() {
        assert_eq!(guess_type(MIT), Some("MIT"));
        assert_eq!(guess_type(BSD3), Some("BSD-3-Clause"));
        assert_eq!(
            guess_type("Apache License\n  Version 2.0, January 2004\n http://www.apache.org/licenses/"),
            Some("Apache-2.0")
        );
        assert_eq!(
            guess_type("GNU LESSER GENERAL PUBLIC LICENSE\n Version 3, 29 June 2007"),
            Some("LGPL-3.0")
        );
        assert_eq!(
            guess_type("GNU GENERAL PUBLIC LICENSE\n   Version 2, June 1991"),
            Some("GPL-2.0")
        );
        assert_eq!(
            guess_type("Mozilla Public License Version 2.0\n=================================="),
            Some("MPL-2.0")
        );
    }

    #[test]
    fn test_guess_unknown_text() {
        assert_eq!(guess_type("See the project website for terms."), None);
        assert_eq!(guess_type(""), None);
    }

    #[test]
    fn test_reserved_rights_without_grant_is_proprietary() {
        assert_eq!(
            guess_type("Copyright 2020 Acme Corp.\nAll rights reserved. Do not copy."),
            Some("Proprietary")
        );
        assert_eq!(
            crate::license::risk::classify(guess_type("All Rights Reserved.").unwrap()),
            crate::models::LicenseRisk::Proprietary
        );
    }

    const GPL2: &str = include_str!("../../testdata/licenses/GPL-2");
    const GPL3: &str = include_str!("../../testdata/licenses/GPL-3");
    const LGPL2: &str = include_str!("../../testdata/licenses/LGPL-2");
    const LGPL21: &str = include_str!("../../testdata/licenses/LGPL-2.1");
    const LGPL3: &str = include_str!("../../testdata/licenses/LGPL-3");
    const MPL11: &str = include_str!("../../testdata/licenses/MPL-1.1");
    const MPL2: &str = include_str!("../../testdata/licenses/MPL-2.0");
    const APACHE2: &str = include_str!("../../testdata/licenses/Apache-2.0");
    const CC0: &str = include_str!("../../testdata/licenses/CC0-1.0");
    const BSD: &str = include_str!("../../testdata/licenses/BSD");

    #[test]
    fn test_full_texts_are_identified_by_their_own_title() {
        let cases = [
            (GPL2, "GPL-2.0"),
            (GPL3, "GPL-3.0"),
            (LGPL2, "LGPL-2.0"),
            (LGPL21, "LGPL-2.1"),
            (LGPL3, "LGPL-3.0"),
            (MPL11, "MPL-1.1"),
            (MPL2, "MPL-2.0"),
            (APACHE2, "Apache-2.0"),
            (CC0, "CC0-1.0"),
            (BSD, "BSD-3-Clause"),
        ];
        for (text, expected) in cases {
            assert_eq!(guess_type(text), Some(expected));
        }
    }

    #[test]
    fn test_families_named_in_the_body_do_not_win() {
        let mentions = |text: &str, phrase: &str| {
            text.to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .contains(phrase)
        };
        assert!(mentions(GPL3, "gnu affero general public license"));
        assert!(mentions(GPL2, "gnu lesser general public license"));
        assert!(mentions(MPL2, "gnu affero general public license"));

        assert_eq!(guess_type(GPL3), Some("GPL-3.0"));
        assert_eq!(guess_type(GPL2), Some("GPL-2.0"));
        assert_eq!(
            crate::license::risk::classify(guess_type(MPL2).unwrap()),
            crate::models::LicenseRisk::WeakCopyleft
        );
    }

    #[test]
    fn test_epl2_secondary_license_clause() {
        let text = format!(
            "Eclipse Public License - v 2.0\n\n{}\n\"Secondary License\" means either the GNU \
             General Public License, Version 2.0, or any later versions of that license.\n",
            "THE ACCOMPANYING PROGRAM IS PROVIDED UNDER THE TERMS OF THIS ECLIPSE PUBLIC LICENSE. "
                .repeat(20)
        );
        assert_eq!(guess_type(&text), Some("EPL-2.0"));
    }

    #[test]
    fn test_short_notices() {
        assert_eq!(
            guess_type(
                "Copyright (C) 2021 Someone\n\nThis program is free software: you can \
                 redistribute it and/or modify it under the terms of the GNU Affero General \
                 Public License as published by the Free Software Foundation, either version 3 \
                 of the License, or (at your option) any later version."
            ),
            Some("AGPL-3.0")
        );
        assert_eq!(
            guess_type(
                "Copyright 2019 Someone\n\nLicensed under the Apache License, Version 2.0 \
                 (the \"License\"); you may not use this file except in compliance."
            ),
            Some("Apache-2.0")
        );
    }

    #[test]
    fn test_detect_reports_base_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("LICENSE.txt"), MIT).unwrap();

        let lic = detect_license(&FsLicenseDetector::new(), tmp.path());
        assert_eq!(lic.license_type(), "MIT");
        assert_eq!(lic.file(), "LICENSE.txt");
    }

    #[test]
    fn test_detect_prefers_license_over_copying() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("COPYING"), "GNU GENERAL PUBLIC LICENSE Version 3").unwrap();
        std::fs::write(tmp.path().join("LICENSE"), BSD3).unwrap();

        let lic = detect_license(&FsLicenseDetector::new(), tmp.path());
        assert_eq!(lic.license_type(), "BSD-3-Clause");
        assert_eq!(lic.file(), "LICENSE");
    }

    #[test]
    fn test_detect_missing_file_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("README.md"), "hello").unwrap();

        let lic = detect_license(&FsLicenseDetector::new(), tmp.path());
        assert!(matches!(lic, Lookup::Unavailable { .. }));
        assert_eq!(lic.license_type(), "");
        assert_eq!(lic.file(), "");
    }

    #[test]
    fn test_detect_unrecognized_text_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("LICENSE"), "Terms to be decided.").unwrap();

        let lic = detect_license(&FsLicenseDetector::new(), tmp.path());
        assert_eq!(lic.license_type(), "");
    }

    #[test]
    fn test_detect_nonexistent_dir_is_unavailable() {
        let lic = detect_license(&FsLicenseDetector::new(), Path::new("/no/such/dir/here"));
        assert!(matches!(lic, Lookup::Unavailable { .. }));
    }
}
