//! 페이로드 압축 풀.
//!
//! 지속 부하에서 압축기 상태(deflate 스트림, zstd 컨텍스트)를 매번 할당하지 않도록
//! 고정 크기 lock-free 풀(`crossbeam::queue::ArrayQueue`)에서 재사용한다.
//! [`CompressorPool::acquire`]가 반환하는 가드는 drop 시 압축기를 풀에 반납하므로
//! 성공/실패와 무관하게 모든 경로에서 반납이 보장된다.

use crossbeam::queue::ArrayQueue;
use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use pulsegate_core::config::CompressionAlgorithm;
use pulsegate_core::error::DispatchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// 기본 풀 크기
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// gzip 헤더 (mtime 없음, OS unknown)
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];

/// zstd 압축 레벨
const ZSTD_LEVEL: i32 = 3;

/// compress_vec 호출 전 확보할 최소 여유 공간
const MIN_SPARE_CAPACITY: usize = 64;

/// 실제 적용된 압축 방식 (Content-Encoding 헤더 결정용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// 압축 안 함
    Identity,
    /// gzip
    Gzip,
    /// Zstandard
    Zstd,
}

impl ContentEncoding {
    /// Content-Encoding 헤더 값 (압축 안 함이면 `None`)
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            ContentEncoding::Identity => None,
            ContentEncoding::Gzip => Some("gzip"),
            ContentEncoding::Zstd => Some("zstd"),
        }
    }
}

impl From<CompressionAlgorithm> for ContentEncoding {
    fn from(algorithm: CompressionAlgorithm) -> Self {
        match algorithm {
            CompressionAlgorithm::Gzip => ContentEncoding::Gzip,
            CompressionAlgorithm::Zstd => ContentEncoding::Zstd,
        }
    }
}

/// 압축 결과
#[derive(Debug, Clone)]
pub struct CompressedPayload {
    /// 전송할 본문
    pub body: Vec<u8>,
    /// 적용된 압축 방식
    pub encoding: ContentEncoding,
}

enum CompressorState {
    Gzip(Compress),
    Zstd(zstd::bulk::Compressor<'static>),
}

/// 재사용 가능한 압축기
pub struct PayloadCompressor {
    state: CompressorState,
}

impl PayloadCompressor {
    /// 새 압축기 생성
    pub fn new(algorithm: CompressionAlgorithm) -> Result<Self, DispatchError> {
        let state = match algorithm {
            CompressionAlgorithm::Gzip => {
                CompressorState::Gzip(Compress::new(Compression::default(), false))
            }
            CompressionAlgorithm::Zstd => CompressorState::Zstd(
                zstd::bulk::Compressor::new(ZSTD_LEVEL)
                    .map_err(|e| DispatchError::Encoding(format!("zstd 컨텍스트 생성 실패: {e}")))?,
            ),
        };
        Ok(Self { state })
    }

    /// 데이터 압축
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, DispatchError> {
        match &mut self.state {
            CompressorState::Gzip(deflate) => gzip(deflate, data),
            CompressorState::Zstd(ctx) => ctx
                .compress(data)
                .map_err(|e| DispatchError::Encoding(format!("zstd 압축 실패: {e}"))),
        }
    }
}

/// raw deflate 스트림을 재사용해 gzip 포맷으로 압축
fn gzip(deflate: &mut Compress, data: &[u8]) -> Result<Vec<u8>, DispatchError> {
    deflate.reset();

    let mut out = Vec::with_capacity(GZIP_HEADER.len() + data.len() / 2 + MIN_SPARE_CAPACITY);
    out.extend_from_slice(&GZIP_HEADER);

    let mut input = data;
    loop {
        if out.capacity() - out.len() < MIN_SPARE_CAPACITY {
            out.reserve(out.capacity().max(MIN_SPARE_CAPACITY * 4));
        }
        let before = deflate.total_in();
        let status = deflate
            .compress_vec(input, &mut out, FlushCompress::Finish)
            .map_err(|e| DispatchError::Encoding(format!("gzip 압축 실패: {e}")))?;
        let consumed = (deflate.total_in() - before) as usize;
        input = &input[consumed..];

        if status == Status::StreamEnd {
            break;
        }
    }

    let mut crc = Crc::new();
    crc.update(data);
    out.extend_from_slice(&crc.sum().to_le_bytes());
    out.extend_from_slice(&crc.amount().to_le_bytes());
    Ok(out)
}

/// 압축기 풀
pub struct CompressorPool {
    algorithm: CompressionAlgorithm,
    idle: ArrayQueue<PayloadCompressor>,
    /// 이 크기 미만이면 압축하지 않음
    threshold: usize,
    /// 지금까지 생성한 압축기 수
    created: AtomicUsize,
}

impl CompressorPool {
    /// 새 풀 생성 (압축기는 필요할 때 생성)
    pub fn new(algorithm: CompressionAlgorithm, capacity: usize, threshold: usize) -> Self {
        Self {
            algorithm,
            idle: ArrayQueue::new(capacity.max(1)),
            threshold,
            created: AtomicUsize::new(0),
        }
    }

    /// 압축기 대여
    ///
    /// 풀이 비어 있으면 새로 생성한다. 가드가 drop되면 반납된다.
    pub fn acquire(&self) -> Result<PooledCompressor<'_>, DispatchError> {
        let compressor = match self.idle.pop() {
            Some(compressor) => compressor,
            None => {
                let compressor = PayloadCompressor::new(self.algorithm)?;
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("압축기 생성 ({:?}), 누적 {total}개", self.algorithm);
                compressor
            }
        };

        Ok(PooledCompressor {
            pool: self,
            compressor: Some(compressor),
        })
    }

    /// 페이로드 압축 (임계값 미만이면 그대로 반환)
    pub fn compress(&self, data: Vec<u8>) -> Result<CompressedPayload, DispatchError> {
        if data.len() < self.threshold {
            return Ok(CompressedPayload {
                body: data,
                encoding: ContentEncoding::Identity,
            });
        }

        let mut compressor = self.acquire()?;
        let body = compressor.compress(&data)?;
        Ok(CompressedPayload {
            body,
            encoding: self.algorithm.into(),
        })
    }

    fn release(&self, compressor: PayloadCompressor) {
        // 풀이 가득 차면 여분은 버린다
        let _ = self.idle.push(compressor);
    }

    /// 압축 알고리즘
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// 풀 최대 크기
    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }

    /// 현재 반납되어 대기 중인 압축기 수
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// 지금까지 생성한 압축기 수
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// 대여 중인 압축기 가드
pub struct PooledCompressor<'a> {
    pool: &'a CompressorPool,
    compressor: Option<PayloadCompressor>,
}

impl PooledCompressor<'_> {
    /// 대여한 압축기로 데이터 압축
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, DispatchError> {
        match self.compressor.as_mut() {
            Some(compressor) => compressor.compress(data),
            None => Err(DispatchError::Encoding("이미 반납된 압축기".into())),
        }
    }
}

impl Drop for PooledCompressor<'_> {
    fn drop(&mut self) {
        if let Some(compressor) = self.compressor.take() {
            self.pool.release(compressor);
        }
    }
}
