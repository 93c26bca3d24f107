/// Synchronous request handler used to erase factory closures.
pub(crate) trait Handler<Request> {
    type Response;
    type Error;

    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error>;
}
