//! Processor composition behind `ProcessorExt`.

use async_trait::async_trait;

use crate::core::{Processor, Result};

/// Processor returned by [`ProcessorExt::then`](crate::core::ProcessorExt::then)
pub struct Then<A, B> {
    first: A,
    second: B,
}

impl<A, B> Then<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl<A, B> Processor for Then<A, B>
where
    A: Processor + Send,
    B: Processor<Input = A::Output> + Send,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        let intermediate = self.first.process(item).await?;
        self.second.process_batch(intermediate).await
    }

    async fn finish(&mut self) -> Result<Vec<Self::Output>> {
        let tail = self.first.finish().await?;
        let mut outputs = self.second.process_batch(tail).await?;
        outputs.extend(self.second.finish().await?);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Processor, ProcessorExt};
    use crate::processors::MapProcessor;

    #[tokio::test]
    async fn test_then_chains_processors() {
        let mut chained =
            MapProcessor::new(|x: i32| x + 1).then(MapProcessor::new(|x: i32| x * 10));
        assert_eq!(chained.process(1).await.unwrap(), vec![20]);
        assert_eq!(
            chained.process_batch(vec![2, 3]).await.unwrap(),
            vec![30, 40]
        );
    }
}
