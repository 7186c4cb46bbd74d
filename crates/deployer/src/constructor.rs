//! Constructor arguments and their resolution against a constructor schema.

use {
    crate::config::ConfigError,
    alloy::{
        dyn_abi::{DynSolType, DynSolValue, Specifier},
        json_abi::Param,
    },
    std::fmt,
};

/// Value of a single constructor argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    /// Textual value as it appears in the configuration. Gets coerced into the
    /// parameter's type during validation.
    Raw(String),
    /// Value that is already typed. Must match the parameter type exactly.
    Typed(DynSolValue),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstructorArg {
    /// Name of the constructor parameter this value is meant for. Unnamed
    /// arguments are matched by position.
    pub name: Option<String>,
    pub value: ArgValue,
}

impl ConstructorArg {
    /// Parses `name=value` or a bare `value`. The part in front of the first
    /// `=` only counts as a name if it is a valid Solidity identifier, so
    /// values such as `https://host/?a=b` stay positional.
    pub fn parse(input: &str) -> Self {
        match input.split_once('=') {
            Some((name, value)) if is_identifier(name.trim()) => Self {
                name: Some(name.trim().to_string()),
                value: ArgValue::Raw(value.to_string()),
            },
            _ => Self {
                name: None,
                value: ArgValue::Raw(input.to_string()),
            },
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.write_str(raw),
            Self::Typed(value) => write!(f, "{value:?}"),
        }
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}={}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Ordered constructor arguments of one deployment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstructorArgs(Vec<ConstructorArg>);

impl ConstructorArgs {
    /// Positional arguments that are already typed.
    pub fn typed(values: impl IntoIterator<Item = DynSolValue>) -> Self {
        Self(
            values
                .into_iter()
                .map(|value| ConstructorArg {
                    name: None,
                    value: ArgValue::Typed(value),
                })
                .collect(),
        )
    }

    /// Arguments as they come from the command line or environment, see
    /// [`ConstructorArg::parse`].
    pub fn parse<S: AsRef<str>>(inputs: impl IntoIterator<Item = S>) -> Self {
        Self(
            inputs
                .into_iter()
                .map(|input| ConstructorArg::parse(input.as_ref()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstructorArg> {
        self.0.iter()
    }

    /// Orders and types the arguments according to `params`.
    pub fn resolve(&self, params: &[Param]) -> Result<Vec<DynSolValue>, ConfigError> {
        let ordered = self.order(params)?;
        params
            .iter()
            .zip(ordered)
            .map(|(param, value)| coerce(param, value))
            .collect()
    }

    fn order<'a>(&'a self, params: &[Param]) -> Result<Vec<&'a ArgValue>, ConfigError> {
        let named = self.0.iter().filter(|arg| arg.name.is_some()).count();
        if named == 0 {
            if self.0.len() != params.len() {
                return Err(ConfigError::ArgumentCount {
                    expected: params.len(),
                    actual: self.0.len(),
                });
            }
            return Ok(self.0.iter().map(|arg| &arg.value).collect());
        }
        if named != self.0.len() {
            return Err(ConfigError::MixedArguments);
        }

        let mut slots: Vec<Option<&ArgValue>> = vec![None; params.len()];
        for arg in &self.0 {
            let name = arg.name.as_deref().unwrap_or_default();
            let index = params
                .iter()
                .position(|param| same_name(&param.name, name))
                .ok_or_else(|| ConfigError::UnknownArgument(name.to_string()))?;
            if slots[index].replace(&arg.value).is_some() {
                return Err(ConfigError::DuplicateArgument(params[index].name.clone()));
            }
        }
        params
            .iter()
            .zip(slots)
            .map(|(param, slot)| {
                slot.ok_or_else(|| ConfigError::MissingArgument(param.name.clone()))
            })
            .collect()
    }
}

fn coerce(param: &Param, value: &ArgValue) -> Result<DynSolValue, ConfigError> {
    let ty: DynSolType = param
        .resolve()
        .map_err(|err| ConfigError::InvalidAbi(err.to_string()))?;
    let invalid = |reason: String| ConfigError::InvalidArgument {
        param: display_name(param),
        ty: ty.sol_type_name().into_owned(),
        reason,
    };
    match value {
        // Strings are taken verbatim, including whitespace and quotes.
        ArgValue::Raw(raw) if matches!(ty, DynSolType::String) => {
            Ok(DynSolValue::String(raw.clone()))
        }
        ArgValue::Raw(raw) => ty
            .coerce_str(raw.trim())
            .map_err(|err| invalid(err.to_string())),
        ArgValue::Typed(value) if ty.matches(value) => Ok(value.clone()),
        ArgValue::Typed(value) => Err(invalid(format!(
            "value of type {} does not match",
            value
                .sol_type_name()
                .unwrap_or_else(|| "unknown".into())
        ))),
    }
}

fn display_name(param: &Param) -> String {
    if param.name.is_empty() {
        param.ty.clone()
    } else {
        param.name.clone()
    }
}

/// Parameter names are compared case-insensitively and without leading
/// underscores, so `_baseURI` can be configured as `baseuri`.
fn same_name(param: &str, configured: &str) -> bool {
    let normalize = |name: &str| name.trim_start_matches('_').to_ascii_lowercase();
    !param.is_empty() && normalize(param) == normalize(configured)
}

fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::primitives::{Address, U256, address},
    };

    fn params() -> Vec<Param> {
        serde_json::from_str(
            r#"[
                { "name": "_baseURI", "type": "string" },
                { "name": "whitelistContract", "type": "address" }
            ]"#,
        )
        .unwrap()
    }

    const WHITELIST: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

    #[test]
    fn parses_named_and_positional_inputs() {
        assert_eq!(
            ConstructorArg::parse("baseURI=https://example.org/"),
            ConstructorArg {
                name: Some("baseURI".to_string()),
                value: ArgValue::Raw("https://example.org/".to_string()),
            }
        );
        assert_eq!(
            ConstructorArg::parse("https://example.org/?a=b").name,
            None,
        );
        assert_eq!(ConstructorArg::parse("42").name, None);
        assert_eq!(
            ConstructorArg::parse("a=b=c").value,
            ArgValue::Raw("b=c".to_string())
        );
    }

    #[test]
    fn resolves_positional_arguments() {
        let args = ConstructorArgs::parse([
            "https://meta.example.org/".to_string(),
            WHITELIST.to_string(),
        ]);
        let values = args.resolve(&params()).unwrap();
        assert_eq!(
            values,
            vec![
                DynSolValue::String("https://meta.example.org/".to_string()),
                DynSolValue::Address(WHITELIST),
            ]
        );
    }

    #[test]
    fn resolves_named_arguments_in_schema_order() {
        let args = ConstructorArgs::parse([
            format!("WHITELISTCONTRACT={WHITELIST}"),
            "baseURI=ipfs://meta/".to_string(),
        ]);
        let values = args.resolve(&params()).unwrap();
        assert_eq!(
            values,
            vec![
                DynSolValue::String("ipfs://meta/".to_string()),
                DynSolValue::Address(WHITELIST),
            ]
        );
    }

    #[test]
    fn string_arguments_are_verbatim() {
        for raw in [" padded ", "\"quoted\"", "", "a,b"] {
            let args = ConstructorArgs::parse([raw.to_string(), format!(" {WHITELIST} ")]);
            assert_eq!(
                args.resolve(&params()).unwrap(),
                vec![
                    DynSolValue::String(raw.to_string()),
                    DynSolValue::Address(WHITELIST),
                ]
            );
        }
    }

    #[test]
    fn arity_mismatch() {
        for count in [0, 1, 3] {
            let args = ConstructorArgs::parse(vec![WHITELIST.to_string(); count]);
            assert_eq!(
                args.resolve(&params()),
                Err(ConfigError::ArgumentCount {
                    expected: 2,
                    actual: count,
                })
            );
        }
    }

    #[test]
    fn named_argument_errors() {
        let unknown = ConstructorArgs::parse(["baseURI=x", "owner=0x00", "whitelistContract=0x00"]);
        assert_eq!(
            unknown.resolve(&params()),
            Err(ConfigError::UnknownArgument("owner".to_string()))
        );

        let duplicate = ConstructorArgs::parse(["baseURI=x", "_baseURI=y"]);
        assert_eq!(
            duplicate.resolve(&params()),
            Err(ConfigError::DuplicateArgument("_baseURI".to_string()))
        );

        let missing = ConstructorArgs::parse(["baseURI=x"]);
        assert_eq!(
            missing.resolve(&params()),
            Err(ConfigError::MissingArgument("whitelistContract".to_string()))
        );

        let mixed = ConstructorArgs::parse(["baseURI=x", "0x00"]);
        assert_eq!(mixed.resolve(&params()), Err(ConfigError::MixedArguments));
    }

    #[test]
    fn type_mismatch() {
        let args = ConstructorArgs::parse(["ipfs://meta/", "not-an-address"]);
        let Err(ConfigError::InvalidArgument { param, ty, .. }) = args.resolve(&params()) else {
            panic!("expected invalid argument");
        };
        assert_eq!(param, "whitelistContract");
        assert_eq!(ty, "address");

        let typed = ConstructorArgs::typed([
            DynSolValue::String("ipfs://meta/".to_string()),
            DynSolValue::Uint(U256::from(1), 256),
        ]);
        assert!(matches!(
            typed.resolve(&params()),
            Err(ConfigError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn typed_arguments_pass_through() {
        let values = vec![
            DynSolValue::String("ipfs://meta/".to_string()),
            DynSolValue::Address(WHITELIST),
        ];
        let args = ConstructorArgs::typed(values.clone());
        assert_eq!(args.resolve(&params()).unwrap(), values);
    }
}
