use http::Method;

use super::{Descriptor, Endpoint, Params};

/// One typed request against a catalog endpoint. The trait is the abstract
/// base: a descriptor can only come out of [`Endpoint::build`], so there is
/// nothing to construct without picking a concrete endpoint.
pub trait Request {
    const ENDPOINT: Endpoint;
    type Response;

    fn descriptor(&self) -> &Descriptor;
    fn response(&self) -> Option<&Self::Response>;

    /// Called by the executor once the payload is decoded. Assigning again overwrites.
    fn set_response(&mut self, response: Self::Response);

    #[inline]
    fn path(&self) -> &str {
        self.descriptor().path()
    }

    #[inline]
    fn method(&self) -> &Method {
        self.descriptor().method()
    }

    #[inline]
    fn params(&self) -> Option<&Params> {
        self.descriptor().params()
    }

    #[inline]
    fn is_stream(&self) -> bool {
        Self::ENDPOINT.definition().stream
    }
}
