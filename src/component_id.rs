use crate::serializer::FormatError;

/// Payload that a component id token resolves to.
///
/// `owner` names the handler that created the component and will receive the interaction,
/// `elements` are arguments only that handler knows how to interpret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId {
    owner: String,
    elements: Vec<String>,
}

impl ComponentId {
    pub fn new(owner: impl Into<String>, elements: Vec<String>) -> Self {
        Self {
            owner: owner.into(),
            elements,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }
}

/// How long a component id record lives in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifespan {
    /// Never removed by the eviction sweep
    Permanent,
    /// Removed once it hasn't been used for longer than the retention threshold
    Regular,
}

impl Lifespan {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifespan::Permanent => "PERMANENT",
            Lifespan::Regular => "REGULAR",
        }
    }
}

impl std::fmt::Display for Lifespan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lifespan {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERMANENT" => Ok(Lifespan::Permanent),
            "REGULAR" => Ok(Lifespan::Regular),
            other => Err(FormatError::new(format!("unknown lifespan `{}`", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifespan_text_form() {
        for lifespan in [Lifespan::Permanent, Lifespan::Regular] {
            assert_eq!(lifespan.as_str().parse::<Lifespan>().ok(), Some(lifespan));
        }
        assert!("regular".parse::<Lifespan>().is_err());
        assert!("".parse::<Lifespan>().is_err());
    }
}
