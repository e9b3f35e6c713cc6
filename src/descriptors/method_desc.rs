use std::fmt;

use crate::{descriptors::TypeIdentity, errors::*, signature::MethodSignature};

/// The managed-side symbol that yields the handler for one native method.
///
/// Handlers are named rather than referenced directly: the managed type that
/// hosts them is located at registration time through the
/// [`TypeManager`](crate::managed::TypeManager).
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct HandlerId(String);

impl HandlerId {
    /// Wraps a connector name.
    pub fn new(name: impl Into<String>) -> Self {
        HandlerId(name.into())
    }

    /// The connector name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(other: &str) -> Self {
        HandlerId::new(other)
    }
}

/// Describes one native method whose body is implemented by managed code.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    name: String,
    sig: MethodSignature,
    handler: HandlerId,
    invoker: Option<TypeIdentity>,
}

impl MethodDescriptor {
    /// Creates a descriptor, parsing `sig`.
    pub fn new(
        name: impl Into<String>,
        sig: impl AsRef<str>,
        handler: impl Into<HandlerId>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || sig.as_ref().is_empty() {
            return Err(Error::InvalidDescriptor(format!(
                "'{name}{}': empty method name or signature",
                sig.as_ref()
            )));
        }
        Ok(Self {
            name,
            sig: MethodSignature::from_str(sig)?,
            handler: handler.into(),
            invoker: None,
        })
    }

    /// Names the managed type that hosts the handler, when it is not the
    /// bound managed type itself.
    pub fn with_invoker(mut self, invoker: TypeIdentity) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Native method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed native signature.
    pub fn sig(&self) -> &MethodSignature {
        &self.sig
    }

    /// Connector symbol of the handler.
    pub fn handler(&self) -> &HandlerId {
        &self.handler
    }

    /// Managed type hosting the handler, if not the bound type.
    pub fn invoker(&self) -> Option<&TypeIdentity> {
        self.invoker.as_ref()
    }

    /// Parses a method table.
    ///
    /// Each non-blank line is one record of the form
    /// `name:signature:connector[:invoker type]`, where the invoker type is an
    /// assembly-qualified name.
    pub fn parse_table(table: &str) -> Result<Vec<MethodDescriptor>> {
        table
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::parse_record)
            .collect()
    }

    fn parse_record(record: &str) -> Result<MethodDescriptor> {
        let mut fields = record.splitn(4, ':');
        let (Some(name), Some(sig), Some(connector)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::InvalidDescriptor(format!(
                "{record}: expected name:signature:connector[:invoker]"
            )));
        };
        if connector.is_empty() {
            return Err(Error::InvalidDescriptor(format!("{record}: empty connector")));
        }
        let desc = MethodDescriptor::new(name, sig, connector)?;
        match fields.next().map(str::trim).filter(|s| !s.is_empty()) {
            Some(invoker) => Ok(desc.with_invoker(TypeIdentity::from_str(invoker)?)),
            None => Ok(desc),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.sig, self.handler)?;
        if let Some(invoker) = &self.invoker {
            write!(f, ":{invoker}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    const TABLE: &str = "n_onRequestReceived:(Lcom/google/android/gms/games/request/GameRequest;)V:GetOnRequestReceived_Lcom_google_android_gms_games_request_GameRequest_Handler:Android.Gms.Games.Request.IOnRequestReceivedListenerInvoker, Xamarin.GooglePlayServices.Games\n\
n_onRequestRemoved:(Ljava/lang/String;)V:GetOnRequestRemoved_Ljava_lang_String_Handler:Android.Gms.Games.Request.IOnRequestReceivedListenerInvoker, Xamarin.GooglePlayServices.Games\n";

    #[test]
    fn parses_generated_tables() {
        let methods = MethodDescriptor::parse_table(TABLE).unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name(), "n_onRequestReceived");
        assert_eq!(
            methods[1].handler().as_str(),
            "GetOnRequestRemoved_Ljava_lang_String_Handler"
        );
        assert_eq!(
            methods[1].invoker().unwrap().name(),
            "Android.Gms.Games.Request.IOnRequestReceivedListenerInvoker"
        );
        // records render back to the table form
        assert_eq!(
            format!("{}\n{}\n", methods[0], methods[1]),
            TABLE
        );
    }

    #[test]
    fn invoker_is_optional() {
        let methods = MethodDescriptor::parse_table("\n  n_run:()V:GetRunHandler  \n\n").unwrap();
        assert_eq!(methods.len(), 1);
        assert!(methods[0].invoker().is_none());
    }

    #[test]
    fn rejects_malformed_records() {
        assert_matches!(
            MethodDescriptor::parse_table("n_run:()V"),
            Err(Error::InvalidDescriptor(_))
        );
        assert_matches!(
            MethodDescriptor::parse_table("n_run:()V:"),
            Err(Error::InvalidDescriptor(_))
        );
        assert_matches!(
            MethodDescriptor::parse_table(":()V:GetRunHandler"),
            Err(Error::InvalidDescriptor(_))
        );
        assert_matches!(
            MethodDescriptor::parse_table("n_run:(Q)V:GetRunHandler"),
            Err(Error::ParseFailed(_))
        );
    }
}
