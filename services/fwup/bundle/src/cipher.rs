//! AES-128-CBC firmware encryption with PKCS#7 padding.

use crate::error::VerifyError;
use crate::keys::CBC_KEY_SIZE;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use fwup_wire::IV_SIZE;
use rand::rngs::OsRng;
use rand::RngCore;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Fresh unpredictable IV
pub fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Pad and encrypt; the output length is always a whole number of blocks
/// and strictly longer than the input
pub fn encrypt(plaintext: &[u8], key: &[u8; CBC_KEY_SIZE], iv: &[u8; IV_SIZE]) -> Vec<u8> {
    Aes128CbcEnc::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt and strip padding
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; CBC_KEY_SIZE],
    iv: &[u8; IV_SIZE],
) -> Result<Vec<u8>, VerifyError> {
    Aes128CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VerifyError::Decrypt)
}
