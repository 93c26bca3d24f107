use super::base::Handler;

#[inline]
#[must_use]
pub(crate) const fn handler_fn<T>(f: T) -> HandlerFn<T> {
    HandlerFn { f }
}

#[derive(Clone)]
pub(crate) struct HandlerFn<T> {
    f: T,
}

impl<F, Request, Response, Error> Handler<Request> for HandlerFn<F>
where
    F: FnMut(Request) -> Result<Response, Error>,
{
    type Response = Response;
    type Error = Error;

    #[inline]
    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error> {
        (self.f)(request)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::{handler_fn, Handler as _};

    #[derive(Clone, Copy)]
    struct Request(bool);
    struct Response(bool);

    #[test]
    fn test_handler() {
        let mut handler = handler_fn(|Request(val)| Ok::<_, Infallible>(Response(val)));

        let request = Request(true);
        let response = handler.call(request).unwrap();

        assert_eq!(request.0, response.0);
    }
}
