use {
    crate::{
        format::{Format, format_by_fourcc},
        gfx_api::DriverFormat,
        video::{LINEAR_MODIFIER, Modifier},
    },
    ahash::AHashMap,
};

/// A pixel format and the modifiers that one side supports for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormatEntry {
    pub format: &'static Format,
    /// Sorted and free of duplicates.
    pub modifiers: Vec<Modifier>,
}

impl FormatEntry {
    pub fn supports(&self, modifier: Modifier) -> bool {
        self.modifiers.binary_search(&modifier).is_ok()
    }
}

/// A set of formats sorted by fourcc.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormatList {
    formats: Vec<FormatEntry>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Intersection {
    /// Modifiers supported by both sides, in the order of the first list.
    pub modifiers: Vec<Modifier>,
    /// Whether the second side accepts linear buffers.
    pub linear: bool,
}

impl FormatList {
    /// Builds a list from (fourcc, modifier) pairs.
    ///
    /// Formats without an entry in the format table are dropped since their
    /// layout is unknown.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, Modifier)>,
    {
        let mut map = AHashMap::<u32, Vec<Modifier>>::new();
        for (fourcc, modifier) in pairs {
            if format_by_fourcc(fourcc).is_none() {
                continue;
            }
            map.entry(fourcc).or_default().push(modifier);
        }
        let mut formats: Vec<_> = map
            .into_iter()
            .filter_map(|(fourcc, mut modifiers)| {
                let format = format_by_fourcc(fourcc)?;
                modifiers.sort_unstable();
                modifiers.dedup();
                Some(FormatEntry { format, modifiers })
            })
            .collect();
        formats.sort_unstable_by_key(|f| f.format.drm);
        Self { formats }
    }

    /// Builds the list of formats the driver can render to.
    ///
    /// Modifiers that the driver can only sample from are dropped.
    pub fn from_driver(formats: &[DriverFormat]) -> Self {
        let pairs = formats.iter().flat_map(|f| {
            f.modifiers
                .iter()
                .filter(|m| !m.external_only)
                .map(move |m| (f.fourcc, m.modifier))
        });
        let mut list = Self::from_pairs(pairs);
        list.formats.retain(|f| !f.modifiers.is_empty());
        list
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatEntry> {
        self.formats.iter()
    }

    pub fn find(&self, fourcc: u32) -> Option<&FormatEntry> {
        self.formats
            .binary_search_by_key(&fourcc, |f| f.format.drm)
            .ok()
            .map(|idx| &self.formats[idx])
    }

    pub fn supports(&self, fourcc: u32, modifier: Modifier) -> bool {
        self.find(fourcc).is_some_and(|f| f.supports(modifier))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (u32, Modifier)> + '_ {
        self.formats
            .iter()
            .flat_map(|f| f.modifiers.iter().map(move |m| (f.format.drm, *m)))
    }

    /// Intersects the modifiers of `fourcc` in this list with those of the
    /// same format in `other`.
    pub fn intersect(&self, other: &FormatList, fourcc: u32) -> Intersection {
        intersect(self.find(fourcc), other.find(fourcc))
    }
}

/// Intersects the modifiers of two entries that need not share a fourcc.
pub fn intersect(first: Option<&FormatEntry>, second: Option<&FormatEntry>) -> Intersection {
    let Some(second) = second else {
        return Intersection::default();
    };
    let modifiers = match first {
        Some(first) => first
            .modifiers
            .iter()
            .copied()
            .filter(|m| second.supports(*m))
            .collect(),
        None => vec![],
    };
    Intersection {
        modifiers,
        linear: second.supports(LINEAR_MODIFIER),
    }
}
