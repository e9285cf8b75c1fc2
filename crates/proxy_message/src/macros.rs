/// Declares a message view over a [`ProxyMessage`](crate::ProxyMessage).
///
/// ```ignore
/// proxy_message! {
///     /// Starts a workflow.
///     pub struct WorkflowExecuteRequest [RequestId, ContextId] = WorkflowExecuteRequest {
///         domain / set_domain: string = "Domain",
///         args / set_args: bytes = "Args",
///         options / set_options: json(WorkflowOptions) = "Options",
///     }
/// }
/// ```
///
/// The bracketed list names the capability layers the message carries
/// (`RequestId`, `Error`, `ContextId`, `ActivityContextId`). Each field
/// becomes a getter/setter pair backed by the property bag. Accessor kinds:
/// `string`, `int`, `long`, `bool`, `duration`, `bytes`, `timestamp`,
/// `json(T)`.
///
/// The second form, without `= Type { .. }`, declares a layer base type whose
/// message type is chosen at construction.
#[macro_export]
macro_rules! proxy_message {
    // -------------------------------------------------------------------------
    // Message impl shared by both forms

    (@message $name:ident [$($cap:ident),*]) => {
        impl $crate::Message for $name {
            fn envelope(&self) -> &$crate::ProxyMessage {
                &self.0
            }

            fn envelope_mut(&mut self) -> &mut $crate::ProxyMessage {
                &mut self.0
            }

            fn clone_message(&self) -> ::std::boxed::Box<dyn $crate::Message> {
                ::std::boxed::Box::new(self.clone())
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<
                dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync,
            > {
                self
            }

            $( $crate::proxy_message!(@cap $cap); )*
        }

        $( $crate::proxy_message!(@cap_impl $name $cap); )*
    };

    // -------------------------------------------------------------------------
    // Capability views

    (@cap RequestId) => {
        fn as_request_id(&self) -> Option<&dyn $crate::HasRequestId> {
            Some(self)
        }
        fn as_request_id_mut(&mut self) -> Option<&mut dyn $crate::HasRequestId> {
            Some(self)
        }
    };
    (@cap Error) => {
        fn as_error(&self) -> Option<&dyn $crate::HasError> {
            Some(self)
        }
        fn as_error_mut(&mut self) -> Option<&mut dyn $crate::HasError> {
            Some(self)
        }
    };
    (@cap ContextId) => {
        fn as_context_id(&self) -> Option<&dyn $crate::HasContextId> {
            Some(self)
        }
        fn as_context_id_mut(&mut self) -> Option<&mut dyn $crate::HasContextId> {
            Some(self)
        }
    };
    (@cap ActivityContextId) => {
        fn as_activity_context_id(&self) -> Option<&dyn $crate::HasActivityContextId> {
            Some(self)
        }
        fn as_activity_context_id_mut(&mut self) -> Option<&mut dyn $crate::HasActivityContextId> {
            Some(self)
        }
    };

    (@cap_impl $name:ident RequestId) => {
        impl $crate::HasRequestId for $name {
            fn request_id(&self) -> i64 {
                self.0.properties.get_long($crate::keys::REQUEST_ID)
            }
            fn set_request_id(&mut self, request_id: i64) {
                self.0.properties.set_long($crate::keys::REQUEST_ID, request_id)
            }
        }
    };
    (@cap_impl $name:ident Error) => {
        impl $crate::HasError for $name {
            fn error(&self) -> Option<$crate::CadenceError> {
                self.0.properties.get_json($crate::keys::ERROR)
            }
            fn set_error(&mut self, error: Option<&$crate::CadenceError>) {
                self.0.properties.set_json($crate::keys::ERROR, error)
            }
        }
    };
    (@cap_impl $name:ident ContextId) => {
        impl $crate::HasContextId for $name {
            fn context_id(&self) -> i64 {
                self.0.properties.get_long($crate::keys::WORKFLOW_CONTEXT_ID)
            }
            fn set_context_id(&mut self, context_id: i64) {
                self.0.properties.set_long($crate::keys::WORKFLOW_CONTEXT_ID, context_id)
            }
        }
    };
    (@cap_impl $name:ident ActivityContextId) => {
        impl $crate::HasActivityContextId for $name {
            fn activity_context_id(&self) -> i64 {
                self.0.properties.get_long($crate::keys::ACTIVITY_CONTEXT_ID)
            }
            fn set_activity_context_id(&mut self, context_id: i64) {
                self.0.properties.set_long($crate::keys::ACTIVITY_CONTEXT_ID, context_id)
            }
        }
    };

    // -------------------------------------------------------------------------
    // Typed accessors

    (@accessor [$($m:tt)*] $getter:ident $setter:ident string $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> Option<String> {
            self.0.properties.get_string($key)
        }
        pub fn $setter(&mut self, value: Option<&str>) {
            self.0.properties.set_string($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident int $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> i32 {
            self.0.properties.get_int($key)
        }
        pub fn $setter(&mut self, value: i32) {
            self.0.properties.set_int($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident long $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> i64 {
            self.0.properties.get_long($key)
        }
        pub fn $setter(&mut self, value: i64) {
            self.0.properties.set_long($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident bool $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> bool {
            self.0.properties.get_bool($key)
        }
        pub fn $setter(&mut self, value: bool) {
            self.0.properties.set_bool($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident duration $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> ::std::time::Duration {
            self.0.properties.get_duration($key)
        }
        pub fn $setter(&mut self, value: ::std::time::Duration) {
            self.0.properties.set_duration($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident bytes $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> Option<Vec<u8>> {
            self.0.properties.get_bytes($key)
        }
        pub fn $setter(&mut self, value: Option<&[u8]>) {
            self.0.properties.set_bytes($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident timestamp $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
            self.0.properties.get_timestamp($key)
        }
        pub fn $setter(&mut self, value: Option<::chrono::DateTime<::chrono::Utc>>) {
            self.0.properties.set_timestamp($key, value)
        }
    };
    (@accessor [$($m:tt)*] $getter:ident $setter:ident json ($t:ty) $key:literal) => {
        $($m)*
        pub fn $getter(&self) -> Option<$t> {
            self.0.properties.get_json($key)
        }
        pub fn $setter(&mut self, value: Option<&$t>) {
            self.0.properties.set_json($key, value)
        }
    };

    // -------------------------------------------------------------------------
    // Layer base type

    (
        $(#[$meta:meta])*
        pub struct $name:ident [$($cap:ident),* $(,)?];
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name($crate::ProxyMessage);

        impl $name {
            pub fn new(message_type: $crate::MessageType) -> Self {
                Self($crate::ProxyMessage::new(message_type))
            }

            pub fn from_envelope(envelope: $crate::ProxyMessage) -> Self {
                Self(envelope)
            }

            pub fn into_envelope(self) -> $crate::ProxyMessage {
                self.0
            }
        }

        $crate::proxy_message!(@message $name [$($cap),*]);
    };

    // -------------------------------------------------------------------------
    // Concrete message

    (
        $(#[$meta:meta])*
        pub struct $name:ident [$($cap:ident),* $(,)?] = $ty:ident {
            $(
                $(#[$fmeta:meta])*
                $getter:ident / $setter:ident : $kind:ident $(($jt:ty))? = $key:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name($crate::ProxyMessage);

        impl $name {
            pub const TYPE: $crate::MessageType = $crate::MessageType::$ty;

            pub fn new() -> Self {
                Self($crate::ProxyMessage::new(Self::TYPE))
            }

            /// Wraps a decoded envelope, rejecting one of a different type.
            pub fn from_envelope(
                envelope: $crate::ProxyMessage,
            ) -> Result<Self, $crate::ProtocolError> {
                if envelope.message_type() != Self::TYPE {
                    return Err($crate::ProtocolError::malformed(::std::format!(
                        "expected {} but got {}",
                        Self::TYPE,
                        envelope.message_type()
                    )));
                }
                Ok(Self(envelope))
            }

            pub fn into_envelope(self) -> $crate::ProxyMessage {
                self.0
            }

            $(
                $crate::proxy_message!(
                    @accessor [$(#[$fmeta])*] $getter $setter $kind $(($jt))? $key
                );
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        $crate::proxy_message!(@message $name [$($cap),*]);
    };
}
