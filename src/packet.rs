use crate::descriptor::SessionDescriptor;
use crate::request::{RequestEntry, ResolutionResult};
use crate::response::ResponseDirective;
use crate::Result;

/// Builds whatever mail should accompany the answer, e.g. a netmail
/// report for the requesting sysop.
///
/// Returned directives are appended to the response list after the
/// requested files. A packet written only for this session should use
/// [`Disposition::EraseAlways`](crate::Disposition::EraseAlways).
pub trait PacketComposer {
    fn compose(
        &self,
        descriptor: &SessionDescriptor,
        results: &[(RequestEntry, ResolutionResult)],
    ) -> Result<Vec<ResponseDirective>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPacketComposer;

impl PacketComposer for NoopPacketComposer {
    fn compose(
        &self,
        _descriptor: &SessionDescriptor,
        _results: &[(RequestEntry, ResolutionResult)],
    ) -> Result<Vec<ResponseDirective>> {
        Ok(vec![])
    }
}
